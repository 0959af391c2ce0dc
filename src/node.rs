//! Node storage for task chains.
//!
//! Every chain owns an append-only arena of nodes. Parent and child links are
//! plain indices into the arena, non-owning in both directions, so the tree
//! can never form a reference cycle; the arena itself stays alive for as long
//! as any [`Task`] handle into it does.

use std::any::{Any, type_name};
use std::fmt::Debug;
use std::rc::Rc;

use crate::error::{Fault, ResultError};
use crate::executor::Resolver;
use crate::task::Task;

/// Index of a node within its chain's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(pub(crate) usize);

/// Lifecycle of a single node within one `start` of its chain.
///
/// Terminal in both [`State::Succeeded`] and [`State::Failed`]; a node is
/// never re-entered after reaching a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Not yet reached by execution.
    Pending,
    /// Action invoked, neither continuation signaled yet.
    Running,
    /// Success continuation signaled; the result is recorded.
    Succeeded,
    /// Failure continuation signaled, or a fault cascaded down from above.
    Failed,
}

pub(crate) type Action = Box<dyn FnOnce(Option<Task>, Resolver) -> anyhow::Result<()>>;
pub(crate) type CompletedHandler = Box<dyn FnOnce(&Output)>;
pub(crate) type ErrorHandler = Box<dyn FnOnce(&Fault)>;
pub(crate) type FinallyHandler = Box<dyn FnOnce()>;

/// A type-erased value produced by a successful action.
///
/// The concrete type name is recorded at the moment of success, so that a
/// later mismatched downcast can name the shape actually stored.
#[derive(Clone)]
pub struct Value {
    data: Rc<dyn Any>,
    refl_name: &'static str,
}

impl Value {
    pub(crate) fn new<T: 'static>(value: T) -> Self {
        Self {
            data: Rc::new(value),
            refl_name: type_name::<T>(),
        }
    }

    /// Name of the concrete type stored inside.
    pub fn type_name(&self) -> &'static str {
        self.refl_name
    }

    /// Downcasts the stored value to `T`.
    pub fn downcast<T: 'static>(&self) -> Result<Rc<T>, ResultError> {
        self.data
            .clone()
            .downcast::<T>()
            .map_err(|_| ResultError::TypeMismatch {
                actual: self.refl_name,
                requested: type_name::<T>(),
            })
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Value({})", self.refl_name)
    }
}

/// Output of a successful action.
///
/// An action either produces a plain value, or delegates to another chain
/// node; in the latter case the engine splices that node's subtree ahead of
/// the declared children (flattening).
#[derive(Clone)]
pub enum Output {
    /// A plain value.
    Value(Value),
    /// The action handed execution off to another chain.
    Chain(Task),
}

impl Output {
    /// Downcasts a plain value output to `T`. A delegated chain never
    /// matches a concrete value type.
    pub fn downcast<T: 'static>(&self) -> Result<Rc<T>, ResultError> {
        match self {
            Output::Value(value) => value.downcast(),
            Output::Chain(_) => Err(ResultError::TypeMismatch {
                actual: "nested task chain",
                requested: type_name::<T>(),
            }),
        }
    }
}

impl Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Output::Value(value) => Debug::fmt(value, f),
            Output::Chain(task) => write!(f, "Chain({:?})", task),
        }
    }
}

pub(crate) struct Node {
    pub state: State,
    /// Taken out of the slot when the node is executed.
    pub action: Option<Action>,
    /// Output of the most recent successful action invocation.
    pub result: Option<Output>,
    pub on_completed: Vec<CompletedHandler>,
    pub on_error: Vec<ErrorHandler>,
    pub on_finally: Vec<FinallyHandler>,
    pub parent: Option<NodeId>,
    /// Insertion order dictates execution order among siblings.
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn new(action: Action, parent: Option<NodeId>) -> Self {
        Self {
            state: State::Pending,
            action: Some(action),
            result: None,
            on_completed: Vec::new(),
            on_error: Vec::new(),
            on_finally: Vec::new(),
            parent,
            children: Vec::new(),
        }
    }
}

/// Append-only storage for every node of one chain.
#[derive(Default)]
pub(crate) struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    pub fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_downcast_matching_type() {
        let value = Value::new(42_u32);
        assert_eq!(*value.downcast::<u32>().unwrap(), 42);
    }

    #[test]
    fn test_value_downcast_mismatch_names_both_shapes() {
        let value = Value::new(42_u32);
        let err = value.downcast::<String>().unwrap_err();
        match err {
            ResultError::TypeMismatch { actual, requested } => {
                assert_eq!(actual, "u32");
                assert!(requested.contains("String"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_value_debug_shows_type_name() {
        let value = Value::new("hello".to_string());
        assert_eq!(format!("{value:?}"), "Value(alloc::string::String)");
    }

    #[test]
    fn test_arena_insert_assigns_sequential_ids() {
        let mut arena = Arena::default();
        let a = arena.insert(Node::new(Box::new(|_, _| Ok(())), None));
        let b = arena.insert(Node::new(Box::new(|_, _| Ok(())), Some(a)));
        assert_eq!(a, NodeId(0));
        assert_eq!(b, NodeId(1));
        assert_eq!(arena.get(b).parent, Some(a));
    }
}
