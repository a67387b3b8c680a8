use std::io::BufRead;
use tokio::sync::mpsc;

/// Forwards lines from a blocking reader into a channel from a plain thread.
///
/// The thread ends at end of input, on a read error, or once the receiver is
/// dropped. It is detached: a thread blocked on a terminal read never holds
/// up process exit.
pub fn spawn_line_reader<R>(reader: R, capacity: usize) -> mpsc::Receiver<String>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    std::thread::spawn(move || {
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("Console read failed: {}", e);
                    break;
                }
            };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
        tracing::debug!("Console reader finished");
    });
    rx
}

/// Operator commands from the process's standard input.
pub fn stdin_commands() -> mpsc::Receiver<String> {
    spawn_line_reader(std::io::BufReader::new(std::io::stdin()), 8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_forwards_lines_then_closes() {
        let mut rx = spawn_line_reader(Cursor::new("r\nshutdown\n"), 2);
        assert_eq!(rx.recv().await.as_deref(), Some("r"));
        assert_eq!(rx.recv().await.as_deref(), Some("shutdown"));
        assert_eq!(rx.recv().await, None);
    }
}
