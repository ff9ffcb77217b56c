//! Session-diff summarizer: reduce the recorded file operations to the net
//! {added, modified, deleted} sets, keyed by the final operation per path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vg_core::{FileOp, FileOperation};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDiff {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

pub fn summarize_file_ops(ops: &[FileOperation]) -> SessionDiff {
    let mut last: BTreeMap<&str, FileOp> = BTreeMap::new();
    for op in ops {
        if matches!(op.operation, FileOp::Read) {
            continue;
        }
        last.insert(op.path.as_str(), op.operation);
    }

    let mut diff = SessionDiff::default();
    for (path, op) in last {
        match op {
            FileOp::Create => diff.added.push(path.to_string()),
            FileOp::Modify => diff.modified.push(path.to_string()),
            FileOp::Delete => diff.deleted.push(path.to_string()),
            FileOp::Read => {}
        }
    }
    diff
}
