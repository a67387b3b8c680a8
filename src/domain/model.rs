use std::fmt;

/// Lending state of one physical copy. File and wire code: `D` (available), `P` (loaned).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CopyStatus {
    Available,
    Loaned,
}

impl CopyStatus {
    pub fn code(self) -> char {
        match self {
            CopyStatus::Available => 'D',
            CopyStatus::Loaned => 'P',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'D' => Some(CopyStatus::Available),
            'P' => Some(CopyStatus::Loaned),
            _ => None,
        }
    }
}

/// `dd-mm-yyyy` date as stored in the inventory file.
///
/// Not a Gregorian date: every month has 30 days and the year never rolls over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DueDate {
    pub day: i32,
    pub month: i32,
    pub year: i32,
}

impl DueDate {
    pub const FALLBACK: DueDate = DueDate {
        day: 1,
        month: 1,
        year: 2000,
    };

    pub fn new(day: i32, month: i32, year: i32) -> Self {
        Self { day, month, year }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.trim().splitn(3, '-');
        let day = parts.next()?.trim().parse().ok()?;
        let month = parts.next()?.trim().parse().ok()?;
        let year = parts.next()?.trim().parse().ok()?;
        Some(Self { day, month, year })
    }

    /// Moves the date one week forward with the 30-day month rule.
    pub fn advance_week(self) -> Self {
        let mut day = self.day.saturating_add(7);
        let mut month = self.month;
        if day > 30 {
            day -= 30;
            month = month.saturating_add(1);
            if !(1..=12).contains(&month) {
                month = 1;
            }
        }
        if !(1..=30).contains(&day) {
            day = 1;
        }
        Self {
            day,
            month,
            year: self.year,
        }
    }
}

impl fmt::Display for DueDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}-{:04}", self.day, self.month, self.year)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookCopy {
    pub number: u32,
    pub status: CopyStatus,
    /// Due date while loaned; carried unchanged while available.
    pub due_date: DueDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Title {
    pub isbn: i64,
    pub name: String,
    pub copies: Vec<BookCopy>,
}

impl Title {
    pub fn new(isbn: i64, name: impl Into<String>) -> Self {
        Self {
            isbn,
            name: name.into(),
            copies: Vec::new(),
        }
    }

    pub fn with_copy(mut self, number: u32, status: CopyStatus, due_date: DueDate) -> Self {
        self.copies.push(BookCopy {
            number,
            status,
            due_date,
        });
        self
    }

    pub fn matches(&self, isbn: i64, name: &str) -> bool {
        self.isbn == isbn && self.name == name
    }

    pub fn has_copy_number(&self, number: u32) -> bool {
        self.copies.iter().any(|c| c.number == number)
    }

    pub fn first_with_status(&mut self, status: CopyStatus) -> Option<&mut BookCopy> {
        self.copies.iter_mut().find(|c| c.status == status)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    pub titles: Vec<Title>,
}

impl Inventory {
    pub fn new(titles: Vec<Title>) -> Self {
        Self { titles }
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    pub fn copy_count(&self) -> usize {
        self.titles.iter().map(|t| t.copies.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Loan,
    Return,
    Renew,
    Quit,
}

impl OperationKind {
    pub fn code(self) -> char {
        match self {
            OperationKind::Loan => 'P',
            OperationKind::Return => 'D',
            OperationKind::Renew => 'R',
            OperationKind::Quit => 'Q',
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "P" => Some(OperationKind::Loan),
            "D" => Some(OperationKind::Return),
            "R" => Some(OperationKind::Renew),
            "Q" => Some(OperationKind::Quit),
            _ => None,
        }
    }
}

/// One decoded request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    pub title_name: String,
    pub isbn: i64,
    pub requester_id: u32,
}

impl Operation {
    pub fn new(kind: OperationKind, title_name: impl Into<String>, isbn: i64, requester_id: u32) -> Self {
        Self {
            kind,
            title_name: title_name.into(),
            isbn,
            requester_id,
        }
    }
}

/// Free-text outcome addressed to one requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub requester_id: u32,
    pub text: String,
}

impl Response {
    pub fn new(requester_id: u32, text: impl Into<String>) -> Self {
        Self {
            requester_id,
            text: text.into(),
        }
    }
}

/// One line of a report: a copy together with the title it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub name: String,
    pub isbn: i64,
    pub copy: BookCopy,
}

impl fmt::Display for SnapshotEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}, {}",
            self.copy.status.code(),
            self.name,
            self.isbn,
            self.copy.number,
            self.copy.due_date
        )
    }
}
