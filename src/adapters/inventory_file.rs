//! Plain-text inventory file.
//!
//! ```text
//! Clean Code,111,2
//! 1,D,01-01-2025
//! 2,P,15-01-2025
//! ```
//!
//! A `name,isbn,copyCount` header is followed by `copyCount` copy lines
//! `copyNumber,status,dd-mm-yyyy`. Fields may carry surrounding spaces.

use crate::domain::model::{BookCopy, CopyStatus, DueDate, Inventory, Title};
use crate::domain::ports::InventoryRepository;
use crate::utils::error::{Result, ServiceError};
use csv::{QuoteStyle, ReaderBuilder, StringRecord, Trim, WriterBuilder};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct InventoryFile {
    path: PathBuf,
    max_titles: usize,
    max_copies: usize,
}

impl InventoryFile {
    pub fn new(path: impl Into<PathBuf>, max_titles: usize, max_copies: usize) -> Self {
        Self {
            path: path.into(),
            max_titles,
            max_copies,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InventoryRepository for InventoryFile {
    fn load(&self) -> Result<Inventory> {
        let file = File::open(&self.path).map_err(|e| ServiceError::InventoryLoadError {
            message: format!("cannot open {}: {}", self.path.display(), e),
        })?;
        let inventory = parse_inventory(file, self.max_titles, self.max_copies)?;
        if inventory.is_empty() {
            return Err(ServiceError::InventoryLoadError {
                message: format!("no valid titles in {}", self.path.display()),
            });
        }
        tracing::info!(
            "📚 Loaded {} titles ({} copies) from {}",
            inventory.titles.len(),
            inventory.copy_count(),
            self.path.display()
        );
        Ok(inventory)
    }

    fn save(&self, inventory: &Inventory) -> Result<()> {
        let file = File::create(&self.path)?;
        write_inventory(BufWriter::new(file), inventory)?;
        tracing::info!("💾 Inventory saved to {}", self.path.display());
        Ok(())
    }
}

fn parse_header(record: &StringRecord) -> Option<(String, i64, usize)> {
    if record.len() != 3 {
        return None;
    }
    let name = record.get(0)?;
    if name.is_empty() {
        return None;
    }
    let isbn = record.get(1)?.parse().ok()?;
    let count = record.get(2)?.parse().ok()?;
    Some((name.to_string(), isbn, count))
}

fn parse_copy(record: &StringRecord) -> Option<BookCopy> {
    if record.len() != 3 {
        return None;
    }
    let number = record.get(0)?.parse().ok()?;
    let mut status = record.get(1)?.chars();
    let status = match (status.next(), status.next()) {
        (Some(code), None) => CopyStatus::from_code(code)?,
        _ => return None,
    };
    let raw_date = record.get(2)?;
    let due_date = DueDate::parse(raw_date).unwrap_or_else(|| {
        tracing::warn!("Unreadable date {:?}, using {}", raw_date, DueDate::FALLBACK);
        DueDate::FALLBACK
    });
    Some(BookCopy {
        number,
        status,
        due_date,
    })
}

/// Reads up to `max_titles` titles. Malformed input is skipped, never fatal.
pub fn parse_inventory<R: Read>(reader: R, max_titles: usize, max_copies: usize) -> Result<Inventory> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .quoting(false)
        .from_reader(reader);

    let mut records = reader.records();
    let mut titles = Vec::new();

    while titles.len() < max_titles {
        let record = match records.next() {
            Some(Ok(record)) => record,
            Some(Err(e)) if e.is_io_error() => return Err(e.into()),
            Some(Err(e)) => {
                tracing::warn!("Skipping unreadable inventory line: {}", e);
                continue;
            }
            None => break,
        };

        let Some((name, isbn, count)) = parse_header(&record) else {
            tracing::warn!("Skipping malformed title line: {:?}", record);
            continue;
        };
        if count == 0 || count > max_copies {
            tracing::warn!("Invalid copy count {} for ISBN {}, title skipped", count, isbn);
            continue;
        }

        let mut title = Title::new(isbn, name);
        for _ in 0..count {
            let record = match records.next() {
                Some(Ok(record)) => record,
                Some(Err(e)) if e.is_io_error() => return Err(e.into()),
                Some(Err(e)) => {
                    tracing::warn!("Skipping unreadable copy line: {}", e);
                    continue;
                }
                None => break,
            };
            match parse_copy(&record) {
                Some(copy) if title.has_copy_number(copy.number) => {
                    tracing::warn!(
                        "Duplicate copy {} for ISBN {}, line skipped",
                        copy.number,
                        isbn
                    );
                }
                Some(copy) => title.copies.push(copy),
                None => tracing::warn!("Skipping malformed copy line: {:?}", record),
            }
        }

        tracing::debug!(
            "Title loaded: {} (ISBN {}) with {} copies",
            title.name,
            title.isbn,
            title.copies.len()
        );
        titles.push(title);
    }

    Ok(Inventory::new(titles))
}

/// Writes the inventory in the same shape it is read, without padding.
pub fn write_inventory<W: Write>(writer: W, inventory: &Inventory) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quote_style(QuoteStyle::Never)
        .from_writer(writer);

    for title in &inventory.titles {
        writer.write_record([
            title.name.clone(),
            title.isbn.to_string(),
            title.copies.len().to_string(),
        ])?;
        for copy in &title.copies {
            writer.write_record([
                copy.number.to_string(),
                copy.status.code().to_string(),
                copy.due_date.to_string(),
            ])?;
        }
    }

    writer.flush()?;
    Ok(())
}
