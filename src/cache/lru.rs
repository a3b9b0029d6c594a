//! LRU List Module
//!
//! Recency ordering for cache eviction, kept as a doubly linked list threaded
//! through an arena of slots addressed by index.

/// Null link.
const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Node<K> {
    key: Option<K>,
    prev: usize,
    next: usize,
}

// == LRU List ==
/// Tracks access order for LRU eviction.
///
/// - Head = most recently used
/// - Tail = least recently used
///
/// Every operation is O(1). Callers hold on to the index returned by
/// [`LruList::push_front`] to promote or unlink the node later. Freed
/// slots are recycled.
#[derive(Debug)]
pub struct LruList<K> {
    nodes: Vec<Node<K>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    len: usize,
}

impl<K> LruList<K> {
    // == Constructor ==
    /// Creates a new empty list.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }

    /// Creates an empty list with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    // == Push Front ==
    /// Adds `key` as the most recently used node and returns its index.
    pub fn push_front(&mut self, key: K) -> usize {
        let node = Node {
            key: Some(key),
            prev: NIL,
            next: NIL,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        self.link_front(idx);
        self.len += 1;
        idx
    }

    // == Touch ==
    /// Marks the node at `idx` as most recently used.
    pub fn touch(&mut self, idx: usize) {
        if self.head == idx {
            return;
        }
        self.unlink(idx);
        self.link_front(idx);
    }

    // == Remove ==
    /// Unlinks the node at `idx` and returns its key.
    pub fn remove(&mut self, idx: usize) -> Option<K> {
        let key = self.nodes.get_mut(idx)?.key.take()?;
        self.unlink(idx);
        self.free.push(idx);
        self.len -= 1;
        Some(key)
    }

    // == Evict Oldest ==
    /// Removes and returns the least recently used key.
    pub fn pop_back(&mut self) -> Option<K> {
        if self.tail == NIL {
            return None;
        }
        self.remove(self.tail)
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    #[cfg(test)]
    pub fn peek_back(&self) -> Option<&K> {
        self.nodes.get(self.tail).and_then(|n| n.key.as_ref())
    }

    /// Iterates keys from most to least recently used.
    #[cfg(test)]
    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    // == Clear ==
    /// Drops every node and resets the list.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
        self.len = 0;
    }

    // == Length ==
    /// Returns the number of linked nodes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn link_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = &mut self.nodes[idx];
            node.prev = NIL;
            node.next = old_head;
        }
        if old_head != NIL {
            self.nodes[old_head].prev = idx;
        } else {
            self.tail = idx;
        }
        self.head = idx;
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = &self.nodes[idx];
            (node.prev, node.next)
        };
        if prev != NIL {
            self.nodes[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.nodes[next].prev = prev;
        } else {
            self.tail = prev;
        }
        let node = &mut self.nodes[idx];
        node.prev = NIL;
        node.next = NIL;
    }
}

impl<K> Default for LruList<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over keys, most recently used first.
#[cfg(test)]
pub struct Iter<'a, K> {
    list: &'a LruList<K>,
    cursor: usize,
}

#[cfg(test)]
impl<'a, K> Iterator for Iter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.list.nodes.get(self.cursor)?;
        self.cursor = node.next;
        node.key.as_ref()
    }
}
