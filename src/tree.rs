use std::collections::{HashMap, HashSet};

use crate::record::ProcessRecord;

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Observed(ProcessRecord),
    /// only known because some record named it as parent
    InferredParentOnly { pid: i64 },
}

#[derive(Debug)]
pub struct TreeNode {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl TreeNode {
    pub fn pid(&self) -> i64 {
        match &self.kind {
            NodeKind::Observed(rec) => rec.pid,
            NodeKind::InferredParentOnly { pid } => *pid,
        }
    }

    pub fn record(&self) -> Option<&ProcessRecord> {
        match &self.kind {
            NodeKind::Observed(rec) => Some(rec),
            NodeKind::InferredParentOnly { .. } => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.record().is_none()
    }
}

/// Parent/child forest over one snapshot. Nodes live in an arena and refer to
/// each other by index.
#[derive(Debug, Default)]
pub struct Forest {
    nodes: Vec<TreeNode>,
    by_pid: HashMap<i64, NodeId>,
    roots: Vec<NodeId>,
}

impl Forest {
    /// Builds the forest, leaving out the record whose pid is `skip_pid`.
    pub fn build(records: Vec<ProcessRecord>, skip_pid: Option<i64>) -> Self {
        let mut forest = Forest::default();

        for rec in records {
            if Some(rec.pid) == skip_pid {
                continue;
            }
            let id = forest.node_for(rec.pid);
            if !forest.nodes[id].is_blank() {
                log::debug!("ignoring duplicate row for pid {}", rec.pid);
                continue;
            }
            let (ppid, self_parented) = (rec.ppid, rec.is_self_parented());
            forest.nodes[id].kind = NodeKind::Observed(rec);

            if !self_parented {
                let parent = forest.node_for(ppid);
                forest.nodes[parent].children.push(id);
                forest.nodes[id].parent = Some(parent);
            }
        }

        forest.break_cycles();
        forest.roots = (0..forest.nodes.len())
            .filter(|&id| forest.nodes[id].parent.is_none())
            .collect();
        log::debug!(
            "forest has {} nodes in {} trees",
            forest.nodes.len(),
            forest.roots.len()
        );
        forest
    }

    fn node_for(&mut self, pid: i64) -> NodeId {
        if let Some(&id) = self.by_pid.get(&pid) {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(TreeNode {
            kind: NodeKind::InferredParentOnly { pid },
            parent: None,
            children: vec![],
        });
        self.by_pid.insert(pid, id);
        id
    }

    ///pid reuse can make a parent chain loop back on itself, then nothing in
    ///the loop is reachable from a root. we cut the loop at its lowest pid.
    fn break_cycles(&mut self) {
        let mut reached = vec![false; self.nodes.len()];
        for id in 0..self.nodes.len() {
            if self.nodes[id].parent.is_none() {
                self.mark_reached(id, &mut reached);
            }
        }

        while let Some(start) = reached.iter().position(|r| !r) {
            //walk up until a node repeats, that node sits on the loop
            let mut seen = HashSet::new();
            let mut id = start;
            while seen.insert(id) {
                match self.parent(id) {
                    Some(parent) => id = parent,
                    None => break,
                }
            }

            let mut members = vec![id];
            let mut cur = self.parent(id);
            while let Some(next) = cur {
                if next == id {
                    break;
                }
                members.push(next);
                cur = self.parent(next);
            }
            let lowest = members
                .into_iter()
                .min_by_key(|&n| self.nodes[n].pid())
                .unwrap_or(id);

            log::warn!(
                "parent cycle through pid {}, treating it as a root",
                self.nodes[lowest].pid()
            );
            self.detach(lowest);
            self.mark_reached(lowest, &mut reached);
        }
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|&c| c != id);
        }
    }

    fn mark_reached(&self, id: NodeId, reached: &mut [bool]) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if reached[id] {
                continue;
            }
            reached[id] = true;
            stack.extend(self.nodes[id].children.iter().copied());
        }
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn find(&self, pid: i64) -> Option<NodeId> {
        self.by_pid.get(&pid).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}
