//! Operator console for the front end: prompt, ask, print, repeat.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::actors::UserAgentHandle;
use crate::error::AskError;

fn rule(c: char) -> String {
    std::iter::repeat(c).take(50).collect()
}

/// Answer banner exactly as printed to the operator.
pub fn format_answer(answer_text: &str) -> String {
    format!(
        "\n{}\nMurakami-style Response:\n{}\n{}\n{}\n\n",
        rule('='),
        rule('-'),
        answer_text,
        rule('=')
    )
}

pub fn format_timeout_notice() -> String {
    format!(
        "\n{}\nResponse timed out. The RAG agent may not be running or is having issues.\n{}\n\n",
        rule('='),
        rule('=')
    )
}

fn format_failure(error: &AskError) -> String {
    format!(
        "\n{}\nCould not get a response: {}\n{}\n\n",
        rule('='),
        error,
        rule('=')
    )
}

/// Run the prompt loop until `input` reaches EOF.
///
/// A blank document path selects `default_document`; a blank question
/// starts the prompts over without sending anything.
pub async fn run_console<R, W>(
    input: R,
    mut output: W,
    handle: UserAgentHandle,
    default_document: &str,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    loop {
        output
            .write_all(format!("\nEnter PDF file path (default: {}): ", default_document).as_bytes())
            .await?;
        output.flush().await?;
        let Some(path_line) = lines.next_line().await? else {
            break;
        };
        let path_line = path_line.trim();
        let document_path = if path_line.is_empty() {
            default_document
        } else {
            path_line
        };

        output.write_all(b"Enter your question: ").await?;
        output.flush().await?;
        let Some(question) = lines.next_line().await? else {
            break;
        };
        let question = question.trim();
        if question.is_empty() {
            continue;
        }

        output
            .write_all(b"\nWaiting for Murakami-style response...\n\n")
            .await?;
        output.flush().await?;

        let rendered = match handle.ask(document_path, question).await {
            Ok(answer_text) => format_answer(&answer_text),
            Err(AskError::Timeout(_)) => format_timeout_notice(),
            Err(e) => {
                tracing::error!("Console: {}", e);
                format_failure(&e)
            }
        };
        output.write_all(rendered.as_bytes()).await?;
        output.flush().await?;
    }
    tracing::info!("Console: input closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::UserMsg;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Stand-in user agent that answers every question by echoing it back.
    fn echo_agent(answer_timeout: Duration) -> (UserAgentHandle, Arc<Mutex<Vec<(String, String)>>>) {
        let (tx, mut rx) = mpsc::channel(4);
        let asked = Arc::new(Mutex::new(Vec::new()));
        let log = asked.clone();
        tokio::spawn(async move {
            while let Some(UserMsg::Ask {
                document_path,
                question,
                respond_to,
            }) = rx.recv().await
            {
                log.lock().unwrap().push((document_path.clone(), question.clone()));
                let _ = respond_to.send(Ok(format!("{} / {}", document_path, question)));
            }
        });
        (UserAgentHandle::new(tx, answer_timeout), asked)
    }

    #[tokio::test]
    async fn test_blank_path_uses_default_and_blank_question_restarts() {
        let (handle, asked) = echo_agent(Duration::from_secs(5));
        let input: &[u8] = b"\n\n./kafka.pdf\nWho is Nakata?\n";
        let mut output = Vec::new();

        run_console(input, &mut output, handle, "./norwegian.pdf").await.unwrap();

        assert_eq!(
            asked.lock().unwrap().clone(),
            vec![("./kafka.pdf".to_string(), "Who is Nakata?".to_string())]
        );
        let transcript = String::from_utf8(output).unwrap();
        assert_eq!(
            transcript.matches("Enter PDF file path (default: ./norwegian.pdf): ").count(),
            3
        );
        assert!(transcript.contains("Waiting for Murakami-style response..."));
        assert!(transcript.contains(&format_answer("./kafka.pdf / Who is Nakata?")));
    }

    #[tokio::test]
    async fn test_default_document() {
        let (handle, asked) = echo_agent(Duration::from_secs(5));
        let input: &[u8] = b"\nWhat happens at the well?\n";
        run_console(input, Vec::new(), handle, "./norwegian.pdf").await.unwrap();
        assert_eq!(asked.lock().unwrap()[0].0, "./norwegian.pdf");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_notice_and_loop_continues() {
        // Agent that accepts questions but never answers
        let (tx, mut rx) = mpsc::channel(4);
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Some(msg) = rx.recv().await {
                held.push(msg);
            }
        });
        let handle = UserAgentHandle::new(tx, Duration::from_secs(120));
        let input: &[u8] = b"\nfirst?\n\nsecond?\n";
        let mut output = Vec::new();

        run_console(input, &mut output, handle, "./norwegian.pdf").await.unwrap();

        let transcript = String::from_utf8(output).unwrap();
        assert_eq!(transcript.matches(&format_timeout_notice()).count(), 2);
    }

    #[test]
    fn test_answer_banner_layout() {
        let banner = format_answer("The well was deep.");
        let lines: Vec<&str> = banner.lines().collect();
        assert_eq!(lines[0], "");
        assert_eq!(lines[1], "=".repeat(50));
        assert_eq!(lines[2], "Murakami-style Response:");
        assert_eq!(lines[3], "-".repeat(50));
        assert_eq!(lines[4], "The well was deep.");
        assert_eq!(lines[5], "=".repeat(50));
    }
}
