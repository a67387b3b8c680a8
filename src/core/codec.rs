//! Wire format for requests and responses.
//!
//! Requests are comma-separated records `kind,name,isbn,requesterId`
//! terminated by `\0` or `\n`. Requesters build them from three-field
//! submissions `kind,name,isbn`. Responses are free text.

use crate::core::inventory::LoanReceipt;
use crate::domain::model::{Operation, OperationKind};
use crate::utils::error::{DecodeError, LendingError};
use tokio::io::{AsyncRead, AsyncReadExt};

pub const DEFAULT_MAX_FRAME_LEN: usize = 256;
pub const DEFAULT_MAX_NAME_LEN: usize = 249;

fn parse_int<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, DecodeError> {
    value
        .trim()
        .parse()
        .map_err(|_| DecodeError::InvalidInteger {
            field,
            value: value.to_string(),
        })
}

fn decode_fields(
    fields: &[&str],
    requester_id: u32,
    max_name_len: usize,
) -> Result<Operation, DecodeError> {
    let kind = OperationKind::from_code(fields[0])
        .ok_or_else(|| DecodeError::UnknownKind(fields[0].to_string()))?;
    let name = fields[1];
    if name.is_empty() {
        return Err(DecodeError::EmptyName);
    }
    if name.len() > max_name_len {
        return Err(DecodeError::NameTooLong { max: max_name_len });
    }
    let isbn = parse_int("isbn", fields[2])?;
    Ok(Operation::new(kind, name, isbn, requester_id))
}

/// Decodes one inbound record `kind,name,isbn,requesterId`.
pub fn decode_request(record: &str, max_name_len: usize) -> Result<Operation, DecodeError> {
    let fields: Vec<&str> = record.split(',').collect();
    if fields.len() != 4 {
        return Err(DecodeError::FieldCount {
            expected: 4,
            found: fields.len(),
        });
    }
    let requester_id = parse_int("requesterId", fields[3])?;
    decode_fields(&fields, requester_id, max_name_len)
}

/// Decodes a requester-side line `kind,name,isbn` and attaches the sender's id.
pub fn decode_submission(
    line: &str,
    requester_id: u32,
    max_name_len: usize,
) -> Result<Operation, DecodeError> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != 3 {
        return Err(DecodeError::FieldCount {
            expected: 3,
            found: fields.len(),
        });
    }
    decode_fields(&fields, requester_id, max_name_len)
}

pub fn encode_request(op: &Operation) -> String {
    format!(
        "{},{},{},{}",
        op.kind.code(),
        op.title_name,
        op.isbn,
        op.requester_id
    )
}

pub fn loan_response(isbn: i64, outcome: Result<LoanReceipt, LendingError>) -> String {
    match outcome {
        Ok(receipt) => format!(
            "Loan successful: ISBN {}, copy {}, due {}",
            isbn, receipt.copy_number, receipt.due_date
        ),
        Err(e) => error_response(isbn, e),
    }
}

pub fn return_response(isbn: i64, outcome: Result<u32, LendingError>) -> String {
    match outcome {
        Ok(copy_number) => format!("Return successful: ISBN {}, copy {}", isbn, copy_number),
        Err(e) => error_response(isbn, e),
    }
}

pub fn renew_response(isbn: i64, outcome: Result<LoanReceipt, LendingError>) -> String {
    match outcome {
        Ok(receipt) => format!(
            "Renewal successful: ISBN {}, copy {}, due {}",
            isbn, receipt.copy_number, receipt.due_date
        ),
        Err(e) => error_response(isbn, e),
    }
}

pub fn error_response(isbn: i64, error: LendingError) -> String {
    match error {
        LendingError::TitleNotFound => {
            format!("Error: ISBN {} not found or title name mismatch", isbn)
        }
        LendingError::NoAvailableCopy => format!("Error: no available copy for ISBN {}", isbn),
        LendingError::NoLoanedCopy => format!("Error: no loaned copy for ISBN {}", isbn),
    }
}

/// Splits the first `\0`/`\n` terminated frame off the front of `buf`.
fn split_frame(buf: &mut Vec<u8>) -> Option<Vec<u8>> {
    let end = buf.iter().position(|b| *b == b'\0' || *b == b'\n')?;
    let mut frame: Vec<u8> = buf.drain(..=end).collect();
    frame.pop();
    if frame.last() == Some(&b'\r') {
        frame.pop();
    }
    Some(frame)
}

/// Splits an inbound byte stream into records.
///
/// `next_frame` is cancel safe: bytes only enter the buffer when a read
/// completes, so it can sit in a `tokio::select!` next to the shutdown signal.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    buf: Vec<u8>,
    max_frame_len: usize,
    discarding: bool,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, max_frame_len: usize) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(max_frame_len * 2),
            max_frame_len,
            discarding: false,
        }
    }

    /// Next complete record, `Ok(None)` when the source reports end of data.
    ///
    /// Empty records are skipped. An oversized record yields one
    /// `FrameTooLong` and its remaining bytes are dropped.
    pub async fn next_frame(&mut self) -> std::io::Result<Option<Result<String, DecodeError>>> {
        loop {
            while let Some(frame) = split_frame(&mut self.buf) {
                if self.discarding {
                    self.discarding = false;
                    continue;
                }
                if frame.is_empty() {
                    continue;
                }
                if frame.len() > self.max_frame_len {
                    return Ok(Some(Err(DecodeError::FrameTooLong {
                        max: self.max_frame_len,
                    })));
                }
                return Ok(Some(
                    String::from_utf8(frame).map_err(|_| DecodeError::NotUtf8),
                ));
            }

            if self.buf.len() > self.max_frame_len {
                // unterminated and already too long: drop it and skip to the next terminator
                self.buf.clear();
                let reported = !self.discarding;
                self.discarding = true;
                if reported {
                    return Ok(Some(Err(DecodeError::FrameTooLong {
                        max: self.max_frame_len,
                    })));
                }
            }

            let n = self.inner.read_buf(&mut self.buf).await?;
            if n == 0 {
                return Ok(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::DueDate;

    #[test]
    fn test_decode_request() {
        let op = decode_request("P,Clean Code,111,4242", DEFAULT_MAX_NAME_LEN).unwrap();
        assert_eq!(op, Operation::new(OperationKind::Loan, "Clean Code", 111, 4242));

        let op = decode_request("Q,shutdown,0,9", DEFAULT_MAX_NAME_LEN).unwrap();
        assert_eq!(op.kind, OperationKind::Quit);
    }

    #[test]
    fn test_decode_rejects_unknown_kind() {
        assert_eq!(
            decode_request("X,Book,123,55", DEFAULT_MAX_NAME_LEN),
            Err(DecodeError::UnknownKind("X".to_string()))
        );
        assert!(matches!(
            decode_request("PP,Book,123,55", DEFAULT_MAX_NAME_LEN),
            Err(DecodeError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_field_count() {
        assert_eq!(
            decode_request("P,Book,123", DEFAULT_MAX_NAME_LEN),
            Err(DecodeError::FieldCount {
                expected: 4,
                found: 3
            })
        );
        assert!(decode_request("P,Book, with comma,123,55", DEFAULT_MAX_NAME_LEN).is_err());
    }

    #[test]
    fn test_decode_rejects_non_integers() {
        assert!(matches!(
            decode_request("D,Book,12a,55", DEFAULT_MAX_NAME_LEN),
            Err(DecodeError::InvalidInteger { field: "isbn", .. })
        ));
        assert!(matches!(
            decode_request("D,Book,123,abc", DEFAULT_MAX_NAME_LEN),
            Err(DecodeError::InvalidInteger {
                field: "requesterId",
                ..
            })
        ));
        assert!(decode_request("D,Book,123,-4", DEFAULT_MAX_NAME_LEN).is_err());
    }

    #[test]
    fn test_decode_tolerates_whitespace_around_integers() {
        let op = decode_request("R,Dune, 77 , 12 ", DEFAULT_MAX_NAME_LEN).unwrap();
        assert_eq!(op.isbn, 77);
        assert_eq!(op.requester_id, 12);
        assert_eq!(op.title_name, "Dune");
    }

    #[test]
    fn test_decode_name_bounds() {
        assert_eq!(
            decode_request("P,,1,2", DEFAULT_MAX_NAME_LEN),
            Err(DecodeError::EmptyName)
        );
        let long = "x".repeat(11);
        assert_eq!(
            decode_request(&format!("P,{},1,2", long), 10),
            Err(DecodeError::NameTooLong { max: 10 })
        );
    }

    #[test]
    fn test_submission_attaches_requester() {
        let op = decode_submission("D,Dune,77", 31337, DEFAULT_MAX_NAME_LEN).unwrap();
        assert_eq!(encode_request(&op), "D,Dune,77,31337");
        assert!(decode_submission("D,Dune,77,1", 1, DEFAULT_MAX_NAME_LEN).is_err());
    }

    #[test]
    fn test_response_texts() {
        let receipt = LoanReceipt {
            copy_number: 1,
            due_date: DueDate::new(8, 1, 2025),
        };
        assert_eq!(
            loan_response(111, Ok(receipt)),
            "Loan successful: ISBN 111, copy 1, due 08-01-2025"
        );
        assert_eq!(
            loan_response(111, Err(LendingError::NoAvailableCopy)),
            "Error: no available copy for ISBN 111"
        );
        assert_eq!(return_response(5, Ok(2)), "Return successful: ISBN 5, copy 2");
        assert_eq!(
            renew_response(5, Err(LendingError::TitleNotFound)),
            "Error: ISBN 5 not found or title name mismatch"
        );
        assert_eq!(
            renew_response(5, Err(LendingError::NoLoanedCopy)),
            "Error: no loaned copy for ISBN 5"
        );
    }

    #[tokio::test]
    async fn test_frame_reader_splits_mixed_terminators() {
        let stream = tokio_test::io::Builder::new()
            .read(b"P,A,1,2\0D,B,")
            .read(b"3,4\n\nR,C,5,6\r\n")
            .build();
        let mut frames = FrameReader::new(stream, DEFAULT_MAX_FRAME_LEN);

        assert_eq!(frames.next_frame().await.unwrap(), Some(Ok("P,A,1,2".to_string())));
        assert_eq!(frames.next_frame().await.unwrap(), Some(Ok("D,B,3,4".to_string())));
        assert_eq!(frames.next_frame().await.unwrap(), Some(Ok("R,C,5,6".to_string())));
        assert_eq!(frames.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_frame_reader_drops_oversized_frames() {
        let mut input = vec![b'a'; 20];
        input.extend_from_slice(b"\0P,A,1,2\0");
        let stream = tokio_test::io::Builder::new().read(&input).build();
        let mut frames = FrameReader::new(stream, 8);

        assert_eq!(
            frames.next_frame().await.unwrap(),
            Some(Err(DecodeError::FrameTooLong { max: 8 }))
        );
        assert_eq!(frames.next_frame().await.unwrap(), Some(Ok("P,A,1,2".to_string())));
    }

    #[tokio::test]
    async fn test_frame_reader_drops_unterminated_overflow() {
        let stream = tokio_test::io::Builder::new()
            .read(&[b'z'; 12])
            .read(b"zzzz\0Q,x,0,1\0")
            .build();
        let mut frames = FrameReader::new(stream, 8);

        assert_eq!(
            frames.next_frame().await.unwrap(),
            Some(Err(DecodeError::FrameTooLong { max: 8 }))
        );
        assert_eq!(frames.next_frame().await.unwrap(), Some(Ok("Q,x,0,1".to_string())));
        assert_eq!(frames.next_frame().await.unwrap(), None);
    }
}
