//! Execution report: the call tree of one request, rendered for humans.

use nu_ansi_term::Color;
use serde::Serialize;

use std::collections::HashMap;

use crate::capability::{CallId, DELEGATE_CAPABILITY};
use crate::tracker::{InvocationRecord, RecordStatus};

const ARG_PREVIEW_CHARS: usize = 60;

/// One invocation and everything it dispatched.
#[derive(Debug, Clone, Serialize)]
pub struct CallNode {
    pub record: InvocationRecord,
    pub children: Vec<CallNode>,
}

/// The call tree of one request; `roots` are the depth-0 invocations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CallReport {
    pub roots: Vec<CallNode>,
}

impl CallReport {
    /// Build the tree from records in open order.
    ///
    /// A child is always opened after its parent, so attaching each record to
    /// an already-seen parent can never form a cycle. Records whose parent is
    /// missing from the set become roots.
    pub fn from_records(records: Vec<InvocationRecord>) -> Self {
        let mut children_of: Vec<Vec<usize>> = vec![Vec::new(); records.len()];
        let mut position: HashMap<CallId, usize> = HashMap::new();
        let mut roots = Vec::new();

        for (i, record) in records.iter().enumerate() {
            match record.parent_call_id.as_ref().and_then(|p| position.get(p)) {
                Some(&parent) => children_of[parent].push(i),
                None => roots.push(i),
            }
            position.insert(record.call_id.clone(), i);
        }

        let mut slots: Vec<Option<InvocationRecord>> = records.into_iter().map(Some).collect();
        let roots = roots
            .into_iter()
            .map(|i| build_node(i, &mut slots, &children_of))
            .collect();
        Self { roots }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total number of invocations in the tree.
    pub fn len(&self) -> usize {
        fn count(node: &CallNode) -> usize {
            1 + node.children.iter().map(count).sum::<usize>()
        }
        self.roots.iter().map(count).sum()
    }

    /// Depth-first iteration over every record.
    pub fn iter(&self) -> impl Iterator<Item = &InvocationRecord> {
        let mut stack: Vec<&CallNode> = self.roots.iter().rev().collect();
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(&node.record)
        })
    }

    /// Render the tree as indented text, optionally with ANSI colours.
    pub fn render(&self, colored: bool) -> String {
        if self.roots.is_empty() {
            return "No tools used in this conversation.".into();
        }
        let mut lines = vec!["Tools used in this conversation:".to_string()];
        for root in &self.roots {
            render_node(root, 1, colored, &mut lines);
        }
        lines.join("\n")
    }
}

fn build_node(
    i: usize,
    slots: &mut Vec<Option<InvocationRecord>>,
    children_of: &[Vec<usize>],
) -> CallNode {
    let record = slots[i].take().unwrap_or_else(|| unreachable!("record visited twice"));
    let children = children_of[i]
        .iter()
        .map(|&c| build_node(c, slots, children_of))
        .collect();
    CallNode { record, children }
}

fn status_symbol(status: RecordStatus) -> (&'static str, Color) {
    match status {
        RecordStatus::Success => ("✓", Color::Green),
        RecordStatus::Error => ("✗", Color::Red),
        RecordStatus::Cancelled => ("⊘", Color::Yellow),
        RecordStatus::Running => ("…", Color::Yellow),
    }
}

fn render_node(node: &CallNode, indent: usize, colored: bool, lines: &mut Vec<String>) {
    let record = &node.record;
    let pad = "  ".repeat(indent);
    let (symbol, color) = status_symbol(record.status);

    let is_delegate = record.capability_name == DELEGATE_CAPABILITY;
    let label = if is_delegate {
        let agent = record.arguments["agent_name"].as_str().unwrap_or("unknown");
        format!("Agent: {agent}")
    } else {
        record.capability_name.clone()
    };
    let label = if colored {
        color.paint(label).to_string()
    } else {
        label
    };

    let depth_marker = if record.depth > 0 {
        format!(" [D{}]", record.depth)
    } else {
        String::new()
    };
    let duration = record
        .duration_secs()
        .map(|s| format!(" ({s:.2}s)"))
        .unwrap_or_default();

    lines.push(format!(
        "{pad}{symbol} {label}{depth_marker}{duration}: {}",
        record.status_message()
    ));

    if is_delegate {
        if let Some(task) = record.arguments["task"].as_str() {
            lines.push(format!("{pad}   Task: \"{}\"", truncate(task, ARG_PREVIEW_CHARS)));
        }
    } else if !record.arguments.is_null() {
        lines.push(format!(
            "{pad}   Args: {}",
            truncate(&record.arguments.to_string(), ARG_PREVIEW_CHARS)
        ));
    }

    for child in &node.children {
        render_node(child, indent + 1, colored, lines);
    }
}

/// Shorten `text` to at most `max` characters, marking the cut with `…`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
