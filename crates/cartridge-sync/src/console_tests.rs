use super::*;
use cartsync_session::{LogLevel, MemoryLog};
use std::time::Duration;

#[test]
fn test_parse_console_line() {
    assert_eq!(
        parse_console_line("clean"),
        Ok(ConsoleCommand::Upload(CommandEvent::CleanUpload))
    );
    assert_eq!(
        parse_console_line("  disable-upload "),
        Ok(ConsoleCommand::Upload(CommandEvent::DisableUpload))
    );
    assert_eq!(
        parse_console_line("enable.upload"),
        Ok(ConsoleCommand::Upload(CommandEvent::EnableUpload))
    );
    assert_eq!(
        parse_console_line("add /ws/site genesis"),
        Ok(ConsoleCommand::Add("/ws/site genesis".to_string()))
    );
    assert_eq!(
        parse_console_line("remove ../other"),
        Ok(ConsoleCommand::Remove("../other".to_string()))
    );
    assert_eq!(parse_console_line("quit"), Ok(ConsoleCommand::Quit));
    assert_eq!(parse_console_line("help"), Ok(ConsoleCommand::Help));
    assert!(parse_console_line("add").is_err());
    assert!(parse_console_line("upload everything").is_err());
}

#[test]
fn test_parse_choice_by_index_and_label() {
    let all = PromptChoice::ALL;
    assert_eq!(parse_choice("1", &all), Some(PromptChoice::RemoveAllAlways));
    assert_eq!(parse_choice(" 4 ", &all), Some(PromptChoice::LeaveAll));
    assert_eq!(parse_choice("0", &all), None);
    assert_eq!(parse_choice("5", &all), None);
    assert_eq!(parse_choice("leave all always", &all), Some(PromptChoice::LeaveAllAlways));
    assert_eq!(parse_choice("yes", &all), None);

    let subset = [PromptChoice::RemoveAll, PromptChoice::LeaveAll];
    assert_eq!(parse_choice("Remove All Always", &subset), None);
    assert_eq!(parse_choice("2", &subset), Some(PromptChoice::LeaveAll));
}

fn prompt() -> (Arc<ConsolePrompt>, Arc<MemoryLog>) {
    let log = Arc::new(MemoryLog::new());
    (Arc::new(ConsolePrompt::new(log.clone())), log)
}

async fn wait_until_pending(prompt: &ConsolePrompt) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while prompt.pending.lock().unwrap().is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("prompt never became pending");
}

#[tokio::test]
async fn test_offer_without_pending_prompt_returns_line() {
    let (prompt, _log) = prompt();
    assert_eq!(prompt.offer("clean".to_string()), Some("clean".to_string()));
}

#[tokio::test]
async fn test_next_line_answers_pending_prompt() {
    let (prompt, log) = prompt();
    let asking = {
        let prompt = prompt.clone();
        tokio::spawn(async move { prompt.choose("Remove old_cartridge?", &PromptChoice::ALL).await })
    };
    wait_until_pending(&prompt).await;

    assert_eq!(prompt.offer("1".to_string()), None);
    assert_eq!(asking.await.unwrap(), Some(PromptChoice::RemoveAllAlways));
    assert!(log.contains("1) Remove All Always"));
}

#[tokio::test]
async fn test_unrecognized_answer_is_no_answer() {
    let (prompt, log) = prompt();
    let asking = {
        let prompt = prompt.clone();
        tokio::spawn(async move { prompt.choose("Remove?", &PromptChoice::ALL).await })
    };
    wait_until_pending(&prompt).await;

    assert_eq!(prompt.offer("clean".to_string()), None);
    assert_eq!(asking.await.unwrap(), None);
    assert!(log.contains("Unrecognized answer"));
}

#[tokio::test]
async fn test_abandoned_prompt_gives_line_back() {
    let (prompt, _log) = prompt();
    let asking = {
        let prompt = prompt.clone();
        tokio::spawn(async move { prompt.choose("Remove?", &PromptChoice::ALL).await })
    };
    wait_until_pending(&prompt).await;
    asking.abort();
    let _ = asking.await;

    assert_eq!(prompt.offer("clean".to_string()), Some("clean".to_string()));
}

#[tokio::test]
async fn test_closed_input_answers_nothing() {
    let (prompt, _log) = prompt();
    let asking = {
        let prompt = prompt.clone();
        tokio::spawn(async move { prompt.choose("Remove?", &PromptChoice::ALL).await })
    };
    wait_until_pending(&prompt).await;
    prompt.close();

    assert_eq!(asking.await.unwrap(), None);
    assert_eq!(prompt.choose("Again?", &PromptChoice::ALL).await, None);
}

#[tokio::test]
async fn test_console_routes_commands_and_folder_changes() {
    let (prompt, _) = prompt();
    let log = Arc::new(MemoryLog::new());
    let bus = CommandBus::new();
    let mut commands = bus.subscribe();
    let (folders_tx, folders_rx) = watch::channel(vec![WorkspaceFolder::file("/ws/a")]);
    let (events_tx, mut events_rx) = mpsc::channel(8);
    let (lines_tx, lines_rx) = mpsc::channel(8);

    let console = Console {
        prompt,
        bus: bus.clone(),
        folders: folders_tx,
        events: events_tx,
        log: log.clone(),
    };
    let running = tokio::spawn(console.run(lines_rx));

    for line in ["clean", "", "add /ws/b", "add /ws/b", "remove /ws/nope", "bogus", "quit"] {
        lines_tx.send(line.to_string()).await.unwrap();
    }
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(commands.recv().await.unwrap(), CommandEvent::CleanUpload);
    let expected = vec![WorkspaceFolder::file("/ws/a"), WorkspaceFolder::file("/ws/b")];
    assert_eq!(
        events_rx.recv().await,
        Some(ManagerEvent::FoldersChanged(expected.clone()))
    );
    assert_eq!(events_rx.recv().await, Some(ManagerEvent::Shutdown));
    assert_eq!(*folders_rx.borrow(), expected);

    assert!(log.contains("Folder already in the workspace: /ws/b"));
    let warnings = log.lines_at(LogLevel::Warn);
    assert_eq!(warnings.len(), 2);
    assert!(warnings[0].contains("/ws/nope"));
    assert!(warnings[1].contains("Unknown command 'bogus'"));
}
