//! The public handle for building and running task chains.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use crate::error::{Fault, ResultError};
use crate::executor::{self, Resolver};
use crate::node::{Arena, Node, NodeId, Output, State};

/// A unit of deferred, callback-driven work plus its attached continuations.
///
/// A `Task` is a cheap, cloneable token referencing one node of a chain;
/// cloning the handle never duplicates the node. Chains are built fluently
/// with [`Task::then`], decorated with [`Task::catch`] and [`Task::finally`],
/// and run with [`Task::start`]. Starting any node replays the chain from its
/// root; the node you start on only determines where your handlers are
/// attached.
///
/// The action supplied to [`Task::new`] and [`Task::then`] receives the
/// predecessor node (`None` for the root) and a one-shot [`Resolver`], and
/// must eventually signal exactly one of success or failure, either
/// synchronously or later from a timer or network callback. Returning `Err`
/// from the action body is equivalent to calling [`Resolver::fail`].
#[derive(Clone)]
pub struct Task {
    pub(crate) chain: Rc<RefCell<Arena>>,
    pub(crate) id: NodeId,
}

impl Task {
    /// Creates the root node of a new chain.
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce(Option<Task>, Resolver) -> anyhow::Result<()> + 'static,
    {
        let mut arena = Arena::default();
        let id = arena.insert(Node::new(Box::new(action), None));
        Self {
            chain: Rc::new(RefCell::new(arena)),
            id,
        }
    }

    /// Chains a new task after this one and returns it, so further chaining
    /// can continue fluently.
    ///
    /// Calling `then` multiple times on the same node creates siblings; all
    /// of them run after this node succeeds, in the order they were attached.
    pub fn then<F>(&self, action: F) -> Task
    where
        F: FnOnce(Option<Task>, Resolver) -> anyhow::Result<()> + 'static,
    {
        let id = {
            let mut arena = self.chain.borrow_mut();
            let child = arena.insert(Node::new(Box::new(action), Some(self.id)));
            arena.get_mut(self.id).children.push(child);
            child
        };
        self.at(id)
    }

    /// Attaches a failure handler to this node and returns a handle to the
    /// same node; the tree shape is unchanged.
    pub fn catch<F>(&self, handler: F) -> Task
    where
        F: FnOnce(&Fault) + 'static,
    {
        self.chain
            .borrow_mut()
            .get_mut(self.id)
            .on_error
            .push(Box::new(handler));
        self.clone()
    }

    /// Attaches a cleanup handler, invoked exactly once after this node
    /// reaches either terminal state. Returns a handle to the same node.
    pub fn finally<F>(&self, handler: F) -> Task
    where
        F: FnOnce() + 'static,
    {
        self.chain
            .borrow_mut()
            .get_mut(self.id)
            .on_finally
            .push(Box::new(handler));
        self.clone()
    }

    /// Runs the chain this node belongs to, always starting from the root.
    ///
    /// Chains are single-use: a second `start` on an already-started chain
    /// is inert.
    pub fn start(&self) {
        executor::start(self, None, None);
    }

    /// Like [`Task::start`], but attaches the given completion and error
    /// handlers to *this* node first, so the caller is notified when
    /// execution reaches this node specifically.
    pub fn start_with<C, E>(&self, on_completed: C, on_error: E)
    where
        C: FnOnce(&Output) + 'static,
        E: FnOnce(&Fault) + 'static,
    {
        executor::start(self, Some(Box::new(on_completed)), Some(Box::new(on_error)));
    }

    /// Ancestor-most node of the chain, found by walking parent links.
    pub fn root(&self) -> Task {
        let id = {
            let arena = self.chain.borrow();
            let mut id = self.id;
            while let Some(parent) = arena.get(id).parent {
                id = parent;
            }
            id
        };
        self.at(id)
    }

    /// Current lifecycle state of this node.
    pub fn state(&self) -> State {
        self.chain.borrow().get(self.id).state
    }

    /// Raw output stored by a successful action invocation, if any.
    pub fn output(&self) -> Option<Output> {
        self.chain.borrow().get(self.id).result.clone()
    }

    /// Typed accessor over the stored output.
    ///
    /// Fails with [`ResultError::Unresolved`] when the node has not
    /// completed successfully, and with [`ResultError::TypeMismatch`] when
    /// the stored value is not a `T`.
    pub fn result<T: 'static>(&self) -> Result<Rc<T>, ResultError> {
        match self.output() {
            Some(output) => output.downcast::<T>(),
            None => Err(ResultError::Unresolved),
        }
    }

    /// Handle to another node of the same chain.
    pub(crate) fn at(&self, id: NodeId) -> Task {
        Task {
            chain: Rc::clone(&self.chain),
            id,
        }
    }

    pub(crate) fn same_node(&self, other: &Task) -> bool {
        Rc::ptr_eq(&self.chain, &other.chain) && self.id == other.id
    }
}

impl Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task(#{}, {:?})", self.id.0, self.state())
    }
}
