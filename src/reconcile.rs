//! Child-list reconciliation
//!
//! Turns the run `old` under `parent` into `new` with as few tree mutations as
//! possible, keeping the identity of every node present in both lists. The
//! run ends right before `end` (`None` = end of the parent).
//!
//! After skipping the common head and tail, the remaining new nodes are walked
//! once: a node already under the cursor is kept, a node followed by the
//! cursor's successor swaps in for the cursor, anything else is inserted
//! before the cursor. Old nodes left between the cursor and `end` are removed.

use tracing::trace;

use crate::dom::{Dom, NodeId};
use crate::error::Result;

pub fn reconcile(
    dom: &mut dyn Dom,
    parent: NodeId,
    old: &[NodeId],
    new: Vec<NodeId>,
    mut end: Option<NodeId>,
) -> Result<Vec<NodeId>> {
    let mut i = 0;
    let mut n = new.len();
    let mut m = old.len();
    let mut operations = 0usize;

    while i < n && i < m && old[i] == new[i] {
        i += 1;
    }
    while i < n && i < m && new[n - 1] == old[m - 1] {
        m -= 1;
        n -= 1;
        end = Some(new[n]);
    }

    if i == m {
        while i < n {
            dom.insert_before(parent, new[i], end)?;
            i += 1;
            operations += 1;
        }
    } else if i == n {
        while i < m {
            dom.remove_child(parent, old[i])?;
            i += 1;
            operations += 1;
        }
    } else {
        let mut cur = Some(old[i]);
        while i < n {
            let wanted = new[i];
            i += 1;
            let next = match cur {
                Some(node) => dom.next_sibling(node),
                None => end,
            };

            if cur == Some(wanted) {
                cur = next;
            } else if let (Some(node), true) = (cur, i < n && Some(new[i]) == next) {
                dom.replace_child(parent, wanted, node)?;
                cur = next;
                operations += 1;
            } else {
                dom.insert_before(parent, wanted, cur)?;
                operations += 1;
            }
        }

        while let Some(node) = cur {
            if Some(node) == end {
                break;
            }
            let next = dom.next_sibling(node);
            dom.remove_child(parent, node)?;
            operations += 1;
            cur = next;
        }
    }

    trace!(old = old.len(), new = new.len(), operations, "reconciled child run");
    Ok(new)
}
