//! Behavior tree (spec.md §4.7), grounded on `w2/behLibrary.cpp`.
//!
//! Per spec.md §9's redesign note, the node tree is an arena: composites
//! store their children's indices into a single `Vec<BtNode<W>>` owned by
//! the `BehaviorTree`, instead of the source's heap-owned polymorphic
//! `BehNode*` tree. `tick` walks depth-first, left to right, from the
//! configured root.

use crate::world::DecisionWorld;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehResult {
    Success,
    Fail,
    Running,
}

pub trait BtLeaf<W: DecisionWorld> {
    fn tick(&mut self, world: &mut W, entity: W::EntityId) -> BehResult;
}

enum BtNode<W: DecisionWorld> {
    Leaf(Box<dyn BtLeaf<W>>),
    Sequence(Vec<usize>),
    Selector(Vec<usize>),
    Parallel(Vec<usize>),
    Invert(usize),
}

pub struct BehaviorTree<W: DecisionWorld> {
    nodes: Vec<BtNode<W>>,
    root: usize,
}

impl<W: DecisionWorld> Default for BehaviorTree<W> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            root: 0,
        }
    }
}

impl<W: DecisionWorld> BehaviorTree<W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_leaf(&mut self, leaf: Box<dyn BtLeaf<W>>) -> usize {
        self.push(BtNode::Leaf(leaf))
    }

    /// Fails on the first failing child; a `Running` child short-circuits
    /// the scan (propagated up); all-success means success.
    pub fn add_sequence(&mut self, children: Vec<usize>) -> usize {
        self.push(BtNode::Sequence(children))
    }

    /// Succeeds on the first succeeding child; a `Running` child
    /// short-circuits; all-fail means fail.
    pub fn add_selector(&mut self, children: Vec<usize>) -> usize {
        self.push(BtNode::Selector(children))
    }

    /// Ticks children in order, stopping at the first non-`Running` result
    /// and returning it without ticking the rest; `Running` only once every
    /// child has been ticked and all returned `Running`.
    pub fn add_parallel(&mut self, children: Vec<usize>) -> usize {
        self.push(BtNode::Parallel(children))
    }

    /// Success<->fail swap; `Running` passes through unchanged.
    pub fn add_invert(&mut self, child: usize) -> usize {
        self.push(BtNode::Invert(child))
    }

    pub fn set_root(&mut self, root: usize) {
        self.root = root;
    }

    fn push(&mut self, node: BtNode<W>) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn tick(&mut self, world: &mut W, entity: W::EntityId) -> BehResult {
        self.tick_node(self.root, world, entity)
    }

    fn tick_node(&mut self, id: usize, world: &mut W, entity: W::EntityId) -> BehResult {
        enum Kind {
            Leaf,
            Sequence(Vec<usize>),
            Selector(Vec<usize>),
            Parallel(Vec<usize>),
            Invert(usize),
        }

        let kind = match &self.nodes[id] {
            BtNode::Leaf(_) => Kind::Leaf,
            BtNode::Sequence(c) => Kind::Sequence(c.clone()),
            BtNode::Selector(c) => Kind::Selector(c.clone()),
            BtNode::Parallel(c) => Kind::Parallel(c.clone()),
            BtNode::Invert(c) => Kind::Invert(*c),
        };

        match kind {
            Kind::Leaf => {
                let BtNode::Leaf(leaf) = &mut self.nodes[id] else {
                    unreachable!()
                };
                leaf.tick(world, entity)
            }
            Kind::Sequence(children) => {
                let mut result = BehResult::Success;
                for c in children {
                    result = self.tick_node(c, world, entity);
                    if result != BehResult::Success {
                        return result;
                    }
                }
                result
            }
            Kind::Selector(children) => {
                let mut result = BehResult::Fail;
                for c in children {
                    result = self.tick_node(c, world, entity);
                    if result != BehResult::Fail {
                        return result;
                    }
                }
                result
            }
            Kind::Parallel(children) => {
                let mut result = BehResult::Running;
                for c in children {
                    result = self.tick_node(c, world, entity);
                    if result != BehResult::Running {
                        return result;
                    }
                }
                result
            }
            Kind::Invert(child) => match self.tick_node(child, world, entity) {
                BehResult::Success => BehResult::Fail,
                BehResult::Fail => BehResult::Success,
                BehResult::Running => BehResult::Running,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::mock::MockWorld;

    struct Fixed(BehResult);

    impl BtLeaf<MockWorld> for Fixed {
        fn tick(&mut self, _world: &mut MockWorld, _entity: u32) -> BehResult {
            self.0
        }
    }

    #[test]
    fn sequence_fails_on_first_failure() {
        let mut bt: BehaviorTree<MockWorld> = BehaviorTree::new();
        let a = bt.add_leaf(Box::new(Fixed(BehResult::Success)));
        let b = bt.add_leaf(Box::new(Fixed(BehResult::Fail)));
        let c = bt.add_leaf(Box::new(Fixed(BehResult::Success)));
        let seq = bt.add_sequence(vec![a, b, c]);
        bt.set_root(seq);
        let mut world = MockWorld::default();
        assert_eq!(bt.tick(&mut world, 0), BehResult::Fail);
    }

    #[test]
    fn selector_returns_first_success() {
        let mut bt: BehaviorTree<MockWorld> = BehaviorTree::new();
        let a = bt.add_leaf(Box::new(Fixed(BehResult::Fail)));
        let b = bt.add_leaf(Box::new(Fixed(BehResult::Success)));
        let c = bt.add_leaf(Box::new(Fixed(BehResult::Fail)));
        let sel = bt.add_selector(vec![a, b, c]);
        bt.set_root(sel);
        let mut world = MockWorld::default();
        assert_eq!(bt.tick(&mut world, 0), BehResult::Success);
    }

    #[test]
    fn parallel_is_running_only_when_every_child_is_running() {
        let mut bt: BehaviorTree<MockWorld> = BehaviorTree::new();
        let a = bt.add_leaf(Box::new(Fixed(BehResult::Running)));
        let b = bt.add_leaf(Box::new(Fixed(BehResult::Running)));
        let par = bt.add_parallel(vec![a, b]);
        bt.set_root(par);
        let mut world = MockWorld::default();
        assert_eq!(bt.tick(&mut world, 0), BehResult::Running);
    }

    #[test]
    fn parallel_returns_first_non_running_result_without_ticking_later_children() {
        use std::cell::Cell;
        use std::rc::Rc;

        struct CountingLeaf(BehResult, Rc<Cell<u32>>);
        impl BtLeaf<MockWorld> for CountingLeaf {
            fn tick(&mut self, _world: &mut MockWorld, _entity: u32) -> BehResult {
                self.1.set(self.1.get() + 1);
                self.0
            }
        }

        let ticks = Rc::new(Cell::new(0));
        let mut bt: BehaviorTree<MockWorld> = BehaviorTree::new();
        let a = bt.add_leaf(Box::new(CountingLeaf(BehResult::Success, ticks.clone())));
        let b = bt.add_leaf(Box::new(CountingLeaf(BehResult::Running, ticks.clone())));
        let par = bt.add_parallel(vec![a, b]);
        bt.set_root(par);
        let mut world = MockWorld::default();
        assert_eq!(bt.tick(&mut world, 0), BehResult::Success);
        assert_eq!(ticks.get(), 1);
    }

    #[test]
    fn invert_swaps_success_and_fail_but_not_running() {
        let mut bt: BehaviorTree<MockWorld> = BehaviorTree::new();
        let leaf = bt.add_leaf(Box::new(Fixed(BehResult::Success)));
        let inv = bt.add_invert(leaf);
        bt.set_root(inv);
        let mut world = MockWorld::default();
        assert_eq!(bt.tick(&mut world, 0), BehResult::Fail);
    }
}
