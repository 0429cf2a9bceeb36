use std::collections::HashSet;

use regex::Regex;

use crate::tree::TreeNode;

/// Which processes the user asked to see.
#[derive(Default, Debug, Clone)]
pub struct Filters {
    /// subtrees rooted at these pids are never shown
    pub exclude_pids: HashSet<i64>,
    pub include_users: HashSet<String>,
    pub exclude_users: HashSet<String>,
    pub include_commands: Vec<Regex>,
    pub exclude_commands: Vec<Regex>,
}

/// Compiles a command pattern so it only matches at the start of the command line.
pub fn command_regex(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})"))
}

fn matches_any(command: &str, regexes: &[Regex]) -> bool {
    regexes.iter().any(|r| r.is_match(command))
}

impl Filters {
    pub fn is_pruned(&self, node: &TreeNode) -> bool {
        self.exclude_pids.contains(&node.pid())
    }

    fn has_include_filters(&self) -> bool {
        !self.include_users.is_empty() || !self.include_commands.is_empty()
    }

    pub fn is_excluded(&self, node: &TreeNode) -> bool {
        node.record().is_some_and(|r| {
            self.exclude_users.contains(&r.user) || matches_any(&r.command, &self.exclude_commands)
        })
    }

    pub fn is_explicitly_included(&self, node: &TreeNode) -> bool {
        let included = !self.has_include_filters()
            || node.record().is_some_and(|r| {
                self.include_users.contains(&r.user)
                    || matches_any(&r.command, &self.include_commands)
            });
        included && !self.is_excluded(node)
    }
}
