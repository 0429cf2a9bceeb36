use crate::{
    filter::Filters,
    record::printable,
    style::RenderParams,
    tree::{Forest, NodeId},
};

/// A piece of rendered output. Escapes take no room on screen.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Escape(String),
    Text(String),
    Newline,
}

struct Renderer<'a> {
    forest: &'a Forest,
    filters: &'a Filters,
    params: &'a RenderParams,
    visible: Vec<bool>,
}

impl<'a> Renderer<'a> {
    fn new(forest: &'a Forest, filters: &'a Filters, params: &'a RenderParams, root: NodeId) -> Self {
        let mut renderer = Self {
            forest,
            filters,
            params,
            visible: vec![false; forest.len()],
        };
        renderer.mark_visible(root);
        renderer
    }

    ///a node shows if it matches, or if anything below it does
    fn mark_visible(&mut self, id: NodeId) -> bool {
        let forest = self.forest;
        let node = forest.node(id);
        if self.filters.is_pruned(node) {
            return false;
        }
        let mut any_child = false;
        for &child in forest.children(id) {
            //no short circuit, every child needs its own flag
            any_child |= self.mark_visible(child);
        }
        let visible = any_child || self.filters.is_explicitly_included(node);
        self.visible[id] = visible;
        visible
    }

    /// `siblings_after` is `None` for roots.
    fn render(&self, id: NodeId, indent: &str, siblings_after: Option<bool>) -> Vec<Fragment> {
        let mut out = vec![];
        if !self.visible[id] {
            return out;
        }
        let children: Vec<NodeId> = self
            .forest
            .children(id)
            .iter()
            .copied()
            .filter(|&c| self.visible[c])
            .collect();

        let styles = &self.params.styles;
        escape(&mut out, &styles.lines);
        let prefix = format!(
            "{indent}{}",
            self.self_prefix(siblings_after, !children.is_empty())
        );
        if !prefix.is_empty() {
            out.push(Fragment::Text(prefix));
        }
        escape(&mut out, &styles.reset);
        self.render_fields(id, &mut out);
        out.push(Fragment::Newline);

        let child_indent = match siblings_after {
            None => indent.to_string(),
            Some(after) => self.child_prefix(indent, after),
        };
        for (i, &child) in children.iter().enumerate() {
            let last = i + 1 == children.len();
            out.extend(self.render(child, &child_indent, Some(!last)));
        }
        out
    }

    fn self_prefix(&self, siblings_after: Option<bool>, has_children: bool) -> String {
        let Some(after) = siblings_after else {
            return String::new();
        };
        let g = &self.params.glyphs;
        let mut s = String::new();
        s.push(if after { g.tee() } else { g.elbow() });
        for _ in 1..self.params.indent {
            s.push(g.dash());
        }
        s.push(if has_children { g.down_tee() } else { g.dash() });
        s.push(' ');
        s
    }

    fn child_prefix(&self, indent: &str, siblings_after: bool) -> String {
        let lead = if siblings_after {
            self.params.glyphs.bar()
        } else {
            ' '
        };
        let pad = " ".repeat(self.params.indent.saturating_sub(1));
        format!("{indent}{lead}{pad}")
    }

    fn render_fields(&self, id: NodeId, out: &mut Vec<Fragment>) {
        let Some(rec) = self.forest.node(id).record() else {
            out.push(Fragment::Text("(blank)".to_string()));
            return;
        };
        let styles = &self.params.styles;
        let pgid = rec.pgid.map_or("?".to_string(), |p| p.to_string());

        self.field(out, &styles.pid, rec.pid.to_string());
        out.push(Fragment::Text(" ".to_string()));
        self.field(out, &styles.pgid, format!("(PGID: {pgid})"));
        out.push(Fragment::Text(" ".to_string()));
        self.field(out, &styles.rss, printable(&rec.rss));
        out.push(Fragment::Text(" ".to_string()));
        self.field(out, &styles.user, printable(&rec.user));
        out.push(Fragment::Text(" ".to_string()));
        if let Some(now) = self.params.show_started {
            let started = rec.start_time(now).format("%Y-%m-%d %H:%M:%S");
            self.field(out, &styles.started, started.to_string());
            out.push(Fragment::Text(" ".to_string()));
        }
        self.field(out, &styles.cmd, printable(&rec.command));
    }

    fn field(&self, out: &mut Vec<Fragment>, style: &str, text: String) {
        escape(out, style);
        out.push(Fragment::Text(text));
        if !style.is_empty() {
            escape(out, &self.params.styles.reset);
        }
    }
}

fn escape(out: &mut Vec<Fragment>, code: &str) {
    if !code.is_empty() {
        out.push(Fragment::Escape(code.to_string()));
    }
}

/// Renders one tree. Empty when nothing in it survives the filters.
pub fn render_tree(
    forest: &Forest,
    root: NodeId,
    filters: &Filters,
    params: &RenderParams,
) -> Vec<Fragment> {
    Renderer::new(forest, filters, params, root).render(root, "", None)
}

/// Joins fragments into text, cutting every line to `max_width` visible characters.
pub fn clip(fragments: &[Fragment], max_width: Option<usize>) -> String {
    let mut out = String::new();
    let mut budget = max_width;
    for fragment in fragments {
        match fragment {
            Fragment::Escape(code) => out.push_str(code),
            Fragment::Newline => {
                out.push('\n');
                budget = max_width;
            }
            Fragment::Text(text) => match budget {
                None => out.push_str(text),
                Some(left) => {
                    let mut taken = 0;
                    for c in text.chars().take(left) {
                        out.push(c);
                        taken += 1;
                    }
                    budget = Some(left - taken);
                }
            },
        }
    }
    out
}

/// Renders every tree of the forest in root order.
pub fn render_forest(forest: &Forest, filters: &Filters, params: &RenderParams) -> String {
    forest
        .roots()
        .iter()
        .map(|&root| clip(&render_tree(forest, root, filters, params), params.max_width))
        .collect()
}
