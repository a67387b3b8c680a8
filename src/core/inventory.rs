use crate::domain::model::{CopyStatus, DueDate, Inventory, SnapshotEntry, Title};
use crate::utils::error::LendingError;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanReceipt {
    pub copy_number: u32,
    pub due_date: DueDate,
}

/// The single shared inventory.
///
/// Every mutation and every snapshot runs under one lock. The lock is never
/// handed out and never held across an `.await`.
#[derive(Debug)]
pub struct InventoryStore {
    inner: Mutex<Inventory>,
}

impl InventoryStore {
    pub fn new(inventory: Inventory) -> Self {
        Self {
            inner: Mutex::new(inventory),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inventory> {
        // critical sections only assign after every check has passed, so a
        // poisoned inventory is still consistent
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_title<R>(
        &self,
        isbn: i64,
        name: &str,
        f: impl FnOnce(&mut Title) -> Result<R, LendingError>,
    ) -> Result<R, LendingError> {
        let mut inventory = self.lock();
        let title = inventory
            .titles
            .iter_mut()
            .find(|t| t.matches(isbn, name))
            .ok_or(LendingError::TitleNotFound)?;
        f(title)
    }

    pub fn find_title(&self, isbn: i64, name: &str) -> Option<Title> {
        self.lock()
            .titles
            .iter()
            .find(|t| t.matches(isbn, name))
            .cloned()
    }

    /// Loans the first available copy and pushes its date one week forward.
    pub fn try_loan(&self, isbn: i64, name: &str) -> Result<LoanReceipt, LendingError> {
        self.with_title(isbn, name, |title| {
            let copy = title
                .first_with_status(CopyStatus::Available)
                .ok_or(LendingError::NoAvailableCopy)?;
            copy.status = CopyStatus::Loaned;
            copy.due_date = copy.due_date.advance_week();
            Ok(LoanReceipt {
                copy_number: copy.number,
                due_date: copy.due_date,
            })
        })
    }

    /// Marks the first loaned copy as available again.
    pub fn try_return(&self, isbn: i64, name: &str) -> Result<u32, LendingError> {
        self.with_title(isbn, name, |title| {
            let copy = title
                .first_with_status(CopyStatus::Loaned)
                .ok_or(LendingError::NoLoanedCopy)?;
            copy.status = CopyStatus::Available;
            Ok(copy.number)
        })
    }

    pub fn try_renew(&self, isbn: i64, name: &str) -> Result<LoanReceipt, LendingError> {
        self.with_title(isbn, name, |title| {
            let copy = title
                .first_with_status(CopyStatus::Loaned)
                .ok_or(LendingError::NoLoanedCopy)?;
            copy.due_date = copy.due_date.advance_week();
            Ok(LoanReceipt {
                copy_number: copy.number,
                due_date: copy.due_date,
            })
        })
    }

    /// Point-in-time view of every copy, in stored order.
    pub fn snapshot(&self) -> Vec<SnapshotEntry> {
        let inventory = self.lock();
        inventory
            .titles
            .iter()
            .flat_map(|title| {
                title.copies.iter().map(move |copy| SnapshotEntry {
                    name: title.name.clone(),
                    isbn: title.isbn,
                    copy: copy.clone(),
                })
            })
            .collect()
    }

    /// Consistent clone of the whole inventory, used for persistence.
    pub fn inventory(&self) -> Inventory {
        self.lock().clone()
    }

    pub fn title_count(&self) -> usize {
        self.lock().titles.len()
    }

    pub fn copy_count(&self) -> usize {
        self.lock().copy_count()
    }
}
