//! Red-black ordered index.
//!
//! An ordered set over items of one type under a caller-supplied three-way
//! comparator, with logarithmic insert and delete, nearest-match lookup and
//! bidirectional cursors.
//!
//! Nodes live in an arena (`Vec<Option<Node<T>>>`) and refer to each other by
//! slot index. Children are owned slots, the parent link is a plain handle.
//! Freed slots are recycled through a free list.
//!
//! A [`Cursor`] is a detached position: it does not borrow the index, so it
//! can be handed back to [`OrderedIndex::delete_at`]. Every structural
//! mutation bumps the index's stamp and a cursor taken before the mutation
//! panics when used afterwards.

use std::cell::Cell;
use std::cmp::Ordering;
use std::fmt;

type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Black,
}

#[derive(Debug, Clone)]
struct Node<T> {
    item: T,
    color: Color,
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

/// A position in an [`OrderedIndex`], or past-the-end / before-the-beginning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    node: Option<NodeId>,
    stamp: u64,
}

impl Cursor {
    /// True when the cursor points at no item.
    pub fn is_done(&self) -> bool {
        self.node.is_none()
    }
}

/// Red-black invariant violation found by [`OrderedIndex::check_invariants`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("root is red")]
    RedRoot,

    #[error("red node at slot {0} has a red child")]
    RedChildOfRed(usize),

    #[error("black height differs below slot {0}")]
    BlackHeightMismatch(usize),

    #[error("slot {0} does not point back to its parent")]
    BrokenParentLink(usize),

    #[error("items out of order at in-order position {0}")]
    OutOfOrder(usize),

    #[error("tree holds {actual} items but len() is {expected}")]
    LenMismatch { expected: usize, actual: usize },

    #[error("cached {0} bound does not match the tree")]
    StaleBound(&'static str),
}

pub struct OrderedIndex<T, C> {
    nodes: Vec<Option<Node<T>>>,
    free: Vec<NodeId>,
    root: Option<NodeId>,
    len: usize,
    stamp: u64,
    // `None` means empty or not yet recomputed since the endpoint was deleted.
    min_node: Cell<Option<NodeId>>,
    max_node: Cell<Option<NodeId>>,
    compare: C,
}

impl<T, C> OrderedIndex<T, C>
where
    C: Fn(&T, &T) -> Ordering,
{
    /// Creates an empty index ordered by `compare`, which must be a total
    /// order. Items comparing `Equal` are the same key.
    pub fn new(compare: C) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            len: 0,
            stamp: 0,
            min_node: Cell::new(None),
            max_node: Cell::new(None),
            compare,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts `item`. Returns false, leaving the index untouched, when an
    /// equal item is already present.
    pub fn insert(&mut self, item: T) -> bool {
        let mut parent = None;
        let mut attach_left = false;
        let mut leftmost = true;
        let mut rightmost = true;
        let mut cur = self.root;

        while let Some(id) = cur {
            let node = self.node(id);
            match (self.compare)(&item, &node.item) {
                Ordering::Equal => return false,
                Ordering::Less => {
                    rightmost = false;
                    attach_left = true;
                    parent = Some(id);
                    cur = node.left;
                }
                Ordering::Greater => {
                    leftmost = false;
                    attach_left = false;
                    parent = Some(id);
                    cur = node.right;
                }
            }
        }

        let id = self.alloc(Node {
            item,
            color: Color::Red,
            parent,
            left: None,
            right: None,
        });
        match parent {
            None => self.root = Some(id),
            Some(p) if attach_left => self.node_mut(p).left = Some(id),
            Some(p) => self.node_mut(p).right = Some(id),
        }
        self.len += 1;
        self.stamp += 1;

        // Rotations never move items between slots, so the new slot stays
        // the minimum (maximum) if it was attached along the leftmost
        // (rightmost) spine.
        if leftmost {
            self.min_node.set(Some(id));
        }
        if rightmost {
            self.max_node.set(Some(id));
        }

        self.insert_fixup(id);
        true
    }

    fn insert_fixup(&mut self, mut n: NodeId) {
        loop {
            // Case 1: n is the root.
            let Some(parent) = self.node(n).parent else {
                break;
            };

            // Case 2: black parent, nothing to repair.
            if self.node(parent).color == Color::Black {
                break;
            }

            // A red parent is never the root.
            let grand = self.parent_of(parent);
            let uncle = if self.node(grand).left == Some(parent) {
                self.node(grand).right
            } else {
                self.node(grand).left
            };

            // Case 3: red uncle. Push the redness up and retry there.
            if self.color_of(uncle) == Color::Red {
                self.set_color(parent, Color::Black);
                if let Some(u) = uncle {
                    self.set_color(u, Color::Black);
                }
                self.set_color(grand, Color::Red);
                n = grand;
                continue;
            }

            // Case 4: zig-zag. Rotate n into its parent's place.
            if self.is_right_child(n) && self.is_left_child(parent) {
                self.rotate_left(parent);
                n = parent;
            } else if self.is_left_child(n) && self.is_right_child(parent) {
                self.rotate_right(parent);
                n = parent;
            }

            // Case 5: straight line. Recolor and rotate at the grandparent.
            let parent = self.parent_of(n);
            let grand = self.parent_of(parent);
            self.set_color(parent, Color::Black);
            self.set_color(grand, Color::Red);
            if self.is_left_child(n) {
                self.rotate_right(grand);
            } else {
                self.rotate_left(grand);
            }
            break;
        }

        if let Some(root) = self.root {
            self.set_color(root, Color::Black);
        }
    }

    /// Smallest item `>= key`, or a done cursor.
    pub fn find_ge(&self, key: &T) -> Cursor {
        self.find_ge_by(|item| (self.compare)(key, item))
    }

    /// Largest item `<= key`, or a done cursor.
    pub fn find_le(&self, key: &T) -> Cursor {
        self.find_le_by(|item| (self.compare)(key, item))
    }

    /// Like [`find_ge`](Self::find_ge) with a closure that returns how the
    /// sought key compares to `item`. The closure must agree with the index's
    /// comparator.
    pub fn find_ge_by<F>(&self, locate: F) -> Cursor
    where
        F: Fn(&T) -> Ordering,
    {
        let mut best = None;
        let mut cur = self.root;
        while let Some(id) = cur {
            let node = self.node(id);
            match locate(&node.item) {
                Ordering::Equal => {
                    best = Some(id);
                    break;
                }
                Ordering::Less => {
                    best = Some(id);
                    cur = node.left;
                }
                Ordering::Greater => cur = node.right,
            }
        }
        self.cursor(best)
    }

    /// Like [`find_le`](Self::find_le) with a closure; see
    /// [`find_ge_by`](Self::find_ge_by).
    pub fn find_le_by<F>(&self, locate: F) -> Cursor
    where
        F: Fn(&T) -> Ordering,
    {
        let mut best = None;
        let mut cur = self.root;
        while let Some(id) = cur {
            let node = self.node(id);
            match locate(&node.item) {
                Ordering::Equal => {
                    best = Some(id);
                    break;
                }
                Ordering::Greater => {
                    best = Some(id);
                    cur = node.right;
                }
                Ordering::Less => cur = node.left,
            }
        }
        self.cursor(best)
    }

    /// Exact lookup.
    pub fn get(&self, key: &T) -> Option<&T> {
        let cursor = self.find_ge(key);
        let item = &self.node(cursor.node?).item;
        ((self.compare)(key, item) == Ordering::Equal).then_some(item)
    }

    /// Cursor at the smallest item.
    pub fn first(&self) -> Cursor {
        let node = match self.min_node.get() {
            Some(id) => Some(id),
            None => {
                let min = self.root.map(|r| self.leftmost(r));
                self.min_node.set(min);
                min
            }
        };
        self.cursor(node)
    }

    /// Cursor at the largest item.
    pub fn last(&self) -> Cursor {
        let node = match self.max_node.get() {
            Some(id) => Some(id),
            None => {
                let max = self.root.map(|r| self.rightmost(r));
                self.max_node.set(max);
                max
            }
        };
        self.cursor(node)
    }

    /// Item under `cursor`.
    ///
    /// # Panics
    ///
    /// When the cursor is done or was taken before the last mutation.
    pub fn item(&self, cursor: Cursor) -> &T {
        let id = self.live(cursor, "item");
        &self.node(id).item
    }

    /// In-order successor of `cursor`.
    pub fn next(&self, cursor: Cursor) -> Cursor {
        let id = self.live(cursor, "next");
        self.cursor(self.successor(id))
    }

    /// In-order predecessor of `cursor`.
    pub fn prev(&self, cursor: Cursor) -> Cursor {
        let id = self.live(cursor, "prev");
        self.cursor(self.predecessor(id))
    }

    /// Removes the item equal to `key`. Returns true iff one was found.
    pub fn delete(&mut self, key: &T) -> bool {
        let cursor = self.find_ge(key);
        let found = match cursor.node {
            Some(id) => (self.compare)(key, &self.node(id).item) == Ordering::Equal,
            None => false,
        };
        if found {
            self.delete_at(cursor);
        }
        found
    }

    /// Removes the item under `cursor` and returns it.
    ///
    /// # Panics
    ///
    /// When the cursor is done or was taken before the last mutation.
    pub fn delete_at(&mut self, cursor: Cursor) -> T {
        let mut target = self.live(cursor, "delete_at");

        // Two children: pull the in-order predecessor's item up and remove
        // the predecessor slot instead, which has at most one child.
        if let (Some(left), Some(_)) = (self.node(target).left, self.node(target).right) {
            let pred = self.rightmost(left);
            self.swap_items(target, pred);
            target = pred;
        }

        if self.min_node.get() == Some(target) {
            self.min_node.set(None);
        }
        if self.max_node.get() == Some(target) {
            self.max_node.set(None);
        }

        let node = self.node(target);
        let child = node.left.or(node.right);
        if node.color == Color::Black {
            match child {
                Some(c) if self.node(c).color == Color::Red => self.set_color(c, Color::Black),
                // A black leaf: repair the black height while the slot is
                // still linked, then drop it.
                _ => self.delete_fixup(target),
            }
        }

        let parent = self.node(target).parent;
        self.replace_child(parent, target, child);
        if let Some(c) = child {
            self.node_mut(c).parent = parent;
        }

        let removed = match self.nodes[target].take() {
            Some(node) => node,
            None => panic!("ordered index slot {target} freed twice"),
        };
        self.free.push(target);
        self.len -= 1;
        self.stamp += 1;

        if let Some(root) = self.root {
            self.set_color(root, Color::Black);
        }
        removed.item
    }

    fn delete_fixup(&mut self, mut n: NodeId) {
        // Case 1: n is the root, the black height shrank uniformly.
        while let Some(parent) = self.node(n).parent {
            let n_is_left = self.node(parent).left == Some(n);
            let mut sibling = self.sibling_of(n);

            // Case 2: red sibling. Rotate it above the parent so that n
            // gets a black sibling.
            if self.node(sibling).color == Color::Red {
                self.set_color(parent, Color::Red);
                self.set_color(sibling, Color::Black);
                if n_is_left {
                    self.rotate_left(parent);
                } else {
                    self.rotate_right(parent);
                }
                sibling = self.sibling_of(n);
            }

            let (near, far) = if n_is_left {
                (self.node(sibling).left, self.node(sibling).right)
            } else {
                (self.node(sibling).right, self.node(sibling).left)
            };
            let nephews_black =
                self.color_of(near) == Color::Black && self.color_of(far) == Color::Black;

            // Case 3: black parent, sibling and nephews. Recolor and move up.
            if nephews_black && self.node(parent).color == Color::Black {
                self.set_color(sibling, Color::Red);
                n = parent;
                continue;
            }

            // Case 4: red parent, black sibling and nephews. Terminal.
            if nephews_black {
                self.set_color(sibling, Color::Red);
                self.set_color(parent, Color::Black);
                break;
            }

            // Case 5: near nephew red, far nephew black. Rotate the red to
            // the far side.
            if self.color_of(far) == Color::Black {
                if let Some(near) = near {
                    self.set_color(near, Color::Black);
                }
                self.set_color(sibling, Color::Red);
                if n_is_left {
                    self.rotate_right(sibling);
                } else {
                    self.rotate_left(sibling);
                }
                sibling = self.sibling_of(n);
            }

            // Case 6: far nephew red. Rotate at the parent. Terminal.
            let parent_color = self.node(parent).color;
            self.set_color(sibling, parent_color);
            self.set_color(parent, Color::Black);
            let far = if n_is_left {
                self.node(sibling).right
            } else {
                self.node(sibling).left
            };
            match far {
                Some(far) => self.set_color(far, Color::Black),
                None => panic!("delete fixup expected a red far nephew"),
            }
            if n_is_left {
                self.rotate_left(parent);
            } else {
                self.rotate_right(parent);
            }
            break;
        }
    }

    /// Ascending iterator over the items.
    pub fn iter(&self) -> Iter<'_, T, C> {
        Iter {
            index: self,
            front: self.first().node,
            back: self.last().node,
            remaining: self.len,
        }
    }

    /// Walks the whole tree and reports the first structural problem: color
    /// rules, black height, parent links, ordering, length and cached bounds.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if let Some(root) = self.root {
            if self.node(root).color == Color::Red {
                return Err(InvariantViolation::RedRoot);
            }
            if self.node(root).parent.is_some() {
                return Err(InvariantViolation::BrokenParentLink(root));
            }
            self.black_height(root)?;
        }

        let mut count = 0;
        let mut prev: Option<&T> = None;
        let mut cur = self.root.map(|r| self.leftmost(r));
        while let Some(id) = cur {
            let item = &self.node(id).item;
            if let Some(p) = prev {
                if (self.compare)(p, item) != Ordering::Less {
                    return Err(InvariantViolation::OutOfOrder(count));
                }
            }
            prev = Some(item);
            count += 1;
            cur = self.successor(id);
        }
        if count != self.len {
            return Err(InvariantViolation::LenMismatch {
                expected: self.len,
                actual: count,
            });
        }

        if let Some(min) = self.min_node.get() {
            if self.root.map(|r| self.leftmost(r)) != Some(min) {
                return Err(InvariantViolation::StaleBound("minimum"));
            }
        }
        if let Some(max) = self.max_node.get() {
            if self.root.map(|r| self.rightmost(r)) != Some(max) {
                return Err(InvariantViolation::StaleBound("maximum"));
            }
        }
        Ok(())
    }

    fn black_height(&self, id: NodeId) -> Result<usize, InvariantViolation> {
        let node = self.node(id);
        let mut heights = [0usize; 2];
        for (slot, child) in [node.left, node.right].into_iter().enumerate() {
            heights[slot] = match child {
                None => 1,
                Some(c) => {
                    let child_node = self.node(c);
                    if child_node.parent != Some(id) {
                        return Err(InvariantViolation::BrokenParentLink(c));
                    }
                    if node.color == Color::Red && child_node.color == Color::Red {
                        return Err(InvariantViolation::RedChildOfRed(id));
                    }
                    self.black_height(c)?
                }
            };
        }
        if heights[0] != heights[1] {
            return Err(InvariantViolation::BlackHeightMismatch(id));
        }
        Ok(heights[0] + usize::from(node.color == Color::Black))
    }

    #[cfg(test)]
    pub(crate) fn preorder(&self) -> Vec<(&T, Color, usize)> {
        let mut out = Vec::with_capacity(self.len);
        let mut stack: Vec<(NodeId, usize)> = self.root.map(|r| (r, 0)).into_iter().collect();
        while let Some((id, depth)) = stack.pop() {
            let node = self.node(id);
            out.push((&node.item, node.color, depth));
            if let Some(r) = node.right {
                stack.push((r, depth + 1));
            }
            if let Some(l) = node.left {
                stack.push((l, depth + 1));
            }
        }
        out
    }
}

impl<T, C> OrderedIndex<T, C> {
    fn node(&self, id: NodeId) -> &Node<T> {
        match self.nodes.get(id).and_then(Option::as_ref) {
            Some(node) => node,
            None => panic!("ordered index slot {id} is not live"),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<T> {
        match self.nodes.get_mut(id).and_then(Option::as_mut) {
            Some(node) => node,
            None => panic!("ordered index slot {id} is not live"),
        }
    }

    fn alloc(&mut self, node: Node<T>) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = Some(node);
                id
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    fn cursor(&self, node: Option<NodeId>) -> Cursor {
        Cursor {
            node,
            stamp: self.stamp,
        }
    }

    fn live(&self, cursor: Cursor, op: &str) -> NodeId {
        assert_eq!(
            cursor.stamp, self.stamp,
            "{op}() with a cursor taken before the index was modified"
        );
        match cursor.node {
            Some(id) => id,
            None => panic!("{op}() on a done cursor"),
        }
    }

    fn color_of(&self, id: Option<NodeId>) -> Color {
        id.map_or(Color::Black, |id| self.node(id).color)
    }

    fn set_color(&mut self, id: NodeId, color: Color) {
        self.node_mut(id).color = color;
    }

    fn parent_of(&self, id: NodeId) -> NodeId {
        match self.node(id).parent {
            Some(p) => p,
            None => panic!("ordered index slot {id} unexpectedly has no parent"),
        }
    }

    fn sibling_of(&self, id: NodeId) -> NodeId {
        let parent = self.node(self.parent_of(id));
        let sibling = if parent.left == Some(id) {
            parent.right
        } else {
            parent.left
        };
        match sibling {
            Some(s) => s,
            None => panic!("black slot {id} has no sibling"),
        }
    }

    fn is_left_child(&self, id: NodeId) -> bool {
        self.node(id)
            .parent
            .is_some_and(|p| self.node(p).left == Some(id))
    }

    fn is_right_child(&self, id: NodeId) -> bool {
        self.node(id)
            .parent
            .is_some_and(|p| self.node(p).right == Some(id))
    }

    fn leftmost(&self, mut id: NodeId) -> NodeId {
        while let Some(l) = self.node(id).left {
            id = l;
        }
        id
    }

    fn rightmost(&self, mut id: NodeId) -> NodeId {
        while let Some(r) = self.node(id).right {
            id = r;
        }
        id
    }

    fn successor(&self, id: NodeId) -> Option<NodeId> {
        if let Some(r) = self.node(id).right {
            return Some(self.leftmost(r));
        }
        let mut n = id;
        while let Some(p) = self.node(n).parent {
            if self.node(p).left == Some(n) {
                return Some(p);
            }
            n = p;
        }
        None
    }

    fn predecessor(&self, id: NodeId) -> Option<NodeId> {
        if let Some(l) = self.node(id).left {
            return Some(self.rightmost(l));
        }
        let mut n = id;
        while let Some(p) = self.node(n).parent {
            if self.node(p).right == Some(n) {
                return Some(p);
            }
            n = p;
        }
        None
    }

    fn swap_items(&mut self, a: NodeId, b: NodeId) {
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let (head, tail) = self.nodes.split_at_mut(hi);
        match (head[lo].as_mut(), tail[0].as_mut()) {
            (Some(x), Some(y)) => std::mem::swap(&mut x.item, &mut y.item),
            _ => panic!("swap_items on a freed slot"),
        }
    }

    /// Points `parent`'s link to `old` (or the root) at `new`. The caller
    /// fixes `new`'s parent handle.
    fn replace_child(&mut self, parent: Option<NodeId>, old: NodeId, new: Option<NodeId>) {
        match parent {
            None => self.root = new,
            Some(p) => {
                let p = self.node_mut(p);
                if p.left == Some(old) {
                    p.left = new;
                } else {
                    p.right = new;
                }
            }
        }
    }

    //     X               Y
    //   A   Y     =>    X   C
    //      B C         A B
    fn rotate_left(&mut self, x: NodeId) {
        let Some(y) = self.node(x).right else {
            panic!("rotate_left on slot {x} without a right child");
        };
        let b = self.node(y).left;
        self.node_mut(x).right = b;
        if let Some(b) = b {
            self.node_mut(b).parent = Some(x);
        }
        let xp = self.node(x).parent;
        self.node_mut(y).parent = xp;
        self.replace_child(xp, x, Some(y));
        self.node_mut(y).left = Some(x);
        self.node_mut(x).parent = Some(y);
    }

    //       Y           X
    //     X   C  =>   A   Y
    //    A B             B C
    fn rotate_right(&mut self, y: NodeId) {
        let Some(x) = self.node(y).left else {
            panic!("rotate_right on slot {y} without a left child");
        };
        let b = self.node(x).right;
        self.node_mut(y).left = b;
        if let Some(b) = b {
            self.node_mut(b).parent = Some(y);
        }
        let yp = self.node(y).parent;
        self.node_mut(x).parent = yp;
        self.replace_child(yp, y, Some(x));
        self.node_mut(x).right = Some(y);
        self.node_mut(y).parent = Some(x);
    }
}

impl<T: Ord> OrderedIndex<T, fn(&T, &T) -> Ordering> {
    /// Index ordered by `T`'s own `Ord`.
    pub fn natural() -> Self {
        Self::new(T::cmp)
    }
}

impl<T: fmt::Debug, C> fmt::Debug for OrderedIndex<T, C>
where
    C: Fn(&T, &T) -> Ordering,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Borrowing in-order iterator, see [`OrderedIndex::iter`].
pub struct Iter<'a, T, C> {
    index: &'a OrderedIndex<T, C>,
    front: Option<NodeId>,
    back: Option<NodeId>,
    remaining: usize,
}

impl<'a, T, C> Iterator for Iter<'a, T, C> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.front?;
        self.remaining -= 1;
        self.front = self.index.successor(id);
        Some(&self.index.node(id).item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, C> DoubleEndedIterator for Iter<'_, T, C> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.back?;
        self.remaining -= 1;
        self.back = self.index.predecessor(id);
        Some(&self.index.node(id).item)
    }
}

impl<T, C> ExactSizeIterator for Iter<'_, T, C> {}

impl<'a, T, C> IntoIterator for &'a OrderedIndex<T, C>
where
    C: Fn(&T, &T) -> Ordering,
{
    type Item = &'a T;
    type IntoIter = Iter<'a, T, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
