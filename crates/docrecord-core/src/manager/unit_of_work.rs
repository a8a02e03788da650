//! Pending writes awaiting a flush.

use crate::document::Document;
use crate::storage::WriteOp;

/// Lifecycle callback fired once the write is committed.
#[derive(Debug, Clone)]
pub(crate) enum Committed {
    /// `after_save` with the staged snapshot.
    Saved { doc: Document, is_update: bool },
    /// `after_delete` with the removed snapshot.
    Deleted(Document),
}

/// A staged write and its callback.
#[derive(Debug, Clone)]
pub(crate) struct PendingOp {
    pub(crate) write: WriteOp,
    pub(crate) committed: Committed,
}

/// Ordered set of staged writes, at most one per document.
#[derive(Debug, Default)]
pub(crate) struct UnitOfWork {
    ops: Vec<PendingOp>,
}

impl UnitOfWork {
    /// Stage a write. A later write for the same document replaces the
    /// earlier one.
    pub(crate) fn stage(&mut self, op: PendingOp) {
        let key = target(&op.write);
        self.ops.retain(|staged| target(&staged.write) != key);
        self.ops.push(op);
    }

    pub(crate) fn len(&self) -> usize {
        self.ops.len()
    }

    /// Take every staged write, leaving the unit of work empty.
    pub(crate) fn take(&mut self) -> Vec<PendingOp> {
        std::mem::take(&mut self.ops)
    }

    /// Put writes back after a failed commit, ahead of anything staged since.
    pub(crate) fn restore(&mut self, ops: Vec<PendingOp>) {
        let newer = std::mem::replace(&mut self.ops, ops);
        for op in newer {
            self.stage(op);
        }
    }
}

fn target(write: &WriteOp) -> (&str, &str) {
    match write {
        WriteOp::Put(record) => (record.entity.as_str(), record.id.as_str()),
        WriteOp::Remove { entity, id } => (entity.as_str(), id.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EntityDef;
    use crate::storage::Record;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn op(id: &str) -> PendingOp {
        let doc = Document::new(Arc::new(EntityDef::new("User")));
        PendingOp {
            write: WriteOp::Put(Record::new("User", id, BTreeMap::new())),
            committed: Committed::Saved {
                doc,
                is_update: false,
            },
        }
    }

    #[test]
    fn test_stage_replaces_same_document() {
        let mut uow = UnitOfWork::default();
        uow.stage(op("a"));
        uow.stage(op("b"));
        uow.stage(op("a"));
        assert_eq!(uow.len(), 2);

        let ops = uow.take();
        assert_eq!(uow.len(), 0);
        assert!(matches!(&ops[1].write, WriteOp::Put(r) if r.id == "a"));
    }

    #[test]
    fn test_restore_keeps_newer_writes() {
        let mut uow = UnitOfWork::default();
        uow.stage(op("a"));
        let failed = uow.take();
        uow.stage(op("b"));
        uow.restore(failed);

        let ops = uow.take();
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[0].write, WriteOp::Put(r) if r.id == "a"));
    }
}
