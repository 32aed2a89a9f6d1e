//! Debugging helpers: tree dumps and render traces.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt::{self, Write as _};

use crate::node::{InstanceNode, NodeId};
use crate::props::{Key, PropValue};

/// One node rendered during a traced pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceEvent {
    pub node: NodeId,
    pub component: &'static str,
    pub key: Option<Key>,
    /// Nesting below the node that started the pass.
    pub depth: usize,
}

/// Every node rendered by one pass, in render order. The first event is the
/// node whose invalidation started the pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderTrace {
    pub sequence: u64,
    pub events: Vec<TraceEvent>,
}

impl RenderTrace {
    pub fn origin(&self) -> Option<&TraceEvent> {
        self.events.first()
    }

    pub fn rendered(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.events.iter().map(|event| event.component)
    }
}

impl fmt::Display for RenderTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "render pass #{}", self.sequence)?;
        for event in &self.events {
            write!(f, "{:indent$}<{}>#{}", "", event.component, event.node, indent = event.depth * 2)?;
            if let Some(key) = &event.key {
                write!(f, " key={key}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Ring buffer of recent render traces.
pub(crate) struct Tracer {
    enabled: bool,
    capacity: usize,
    sequence: u64,
    depth: usize,
    current: Option<RenderTrace>,
    traces: VecDeque<RenderTrace>,
}

impl Tracer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            enabled: false,
            capacity,
            sequence: 0,
            depth: 0,
            current: None,
            traces: VecDeque::new(),
        }
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn enter(&mut self, node: &InstanceNode) {
        if self.depth == 0 && self.enabled {
            self.sequence += 1;
            self.current = Some(RenderTrace {
                sequence: self.sequence,
                events: Vec::new(),
            });
        }
        if let Some(trace) = &mut self.current {
            trace.events.push(TraceEvent {
                node: node.id(),
                component: node.name(),
                key: node.key().cloned(),
                depth: self.depth,
            });
        }
        self.depth += 1;
    }

    fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth > 0 {
            return;
        }
        if let Some(trace) = self.current.take() {
            if self.capacity == 0 {
                return;
            }
            if self.traces.len() == self.capacity {
                self.traces.pop_front();
            }
            self.traces.push_back(trace);
        }
    }

    pub(crate) fn traces(&self) -> Vec<RenderTrace> {
        self.traces.iter().cloned().collect()
    }

    pub(crate) fn last(&self) -> Option<RenderTrace> {
        self.traces.back().cloned()
    }

    pub(crate) fn clear(&mut self) {
        self.traces.clear();
    }
}

pub(crate) struct TraceGuard<'a> {
    tracer: &'a RefCell<Tracer>,
}

impl<'a> TraceGuard<'a> {
    pub(crate) fn new(tracer: &'a RefCell<Tracer>) -> Self {
        Self { tracer }
    }
}

impl Drop for TraceGuard<'_> {
    fn drop(&mut self) {
        self.tracer.borrow_mut().exit();
    }
}

/// Indented outline of a committed subtree with keys and props.
///
/// Long strings are cut to 60 characters, lists and children show only their
/// length, and nested maps stop after one level.
pub fn dump_tree(node: &InstanceNode) -> String {
    let mut out = String::new();
    dump_node(node, 0, &mut out);
    out
}

const MAX_STRING: usize = 60;
const MAX_MAP_ENTRIES: usize = 5;

fn dump_node(node: &InstanceNode, depth: usize, out: &mut String) {
    let _ = write!(out, "{:indent$}<{}>", "", node.name(), indent = depth * 2);
    if let Some(key) = node.key() {
        let _ = write!(out, " key={key:?}");
    }
    for (name, value) in node.props().iter() {
        out.push(' ');
        out.push_str(name);
        out.push('=');
        write_value(value, 0, out);
    }
    if !node.is_mounted() {
        out.push_str(" (unmounted)");
    }
    out.push('\n');
    for child in node.children() {
        dump_node(&child, depth + 1, out);
    }
}

fn write_value(value: &PropValue, depth: usize, out: &mut String) {
    match value {
        PropValue::Str(text) if text.chars().count() > MAX_STRING => {
            let mut cut: String = text.chars().take(MAX_STRING - 3).collect();
            cut.push('…');
            let _ = write!(out, "{cut:?}");
        }
        PropValue::List(items) => {
            let _ = write!(out, "[{}]", items.len());
        }
        PropValue::Children(children) => {
            let _ = write!(out, "[{}]", children.len());
        }
        PropValue::Map(_) if depth > 0 => out.push('…'),
        PropValue::Map(map) => {
            out.push('{');
            for (index, (name, value)) in map.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                if index == MAX_MAP_ENTRIES {
                    out.push('…');
                    break;
                }
                out.push_str(name);
                out.push('=');
                write_value(value, depth + 1, out);
            }
            out.push('}');
        }
        PropValue::Callback(_) => out.push_str("<fn>"),
        PropValue::Shared(_) => out.push_str("<shared>"),
        other => {
            let _ = write!(out, "{other:?}");
        }
    }
}
