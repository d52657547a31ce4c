//! Real process launcher tests

use dockmon::filesys::dir::Dir;
use dockmon::pipeline::{CommandLauncher, ProcessExit, ProcessLauncher, ProcessMessage, StageCommand};

async fn collect(command: &StageCommand) -> (String, ProcessExit) {
    let mut messages = CommandLauncher.launch(command);
    let mut output = String::new();
    while let Some(message) = messages.recv().await {
        match message {
            ProcessMessage::Output(chunk) => output.push_str(&chunk),
            ProcessMessage::Exited(exit) => return (output, exit),
        }
    }
    panic!("launcher closed without an exit message");
}

#[tokio::test]
async fn test_launcher_streams_both_pipes() {
    let dir = Dir::create_temp_dir("dockmon-process").await.unwrap();
    let command = StageCommand {
        program: "sh".to_string(),
        args: vec![
            "-c".to_string(),
            "echo hello; echo oops >&2; pwd; exit 3".to_string(),
        ],
        working_dir: dir.path().to_path_buf(),
    };

    let (output, exit) = collect(&command).await;

    assert_eq!(exit, ProcessExit::Code(3));
    assert!(!exit.success());
    assert!(output.contains("hello\n"));
    assert!(output.contains("oops\n"));
    assert!(output.contains(dir.path().file_name().unwrap().to_str().unwrap()));
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_launcher_success() {
    let command = StageCommand {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), "true".to_string()],
        working_dir: std::env::temp_dir(),
    };

    let (output, exit) = collect(&command).await;
    assert!(exit.success());
    assert!(output.is_empty());
}

#[tokio::test]
async fn test_launcher_spawn_failure() {
    let command = StageCommand {
        program: "/nonexistent/dockmon-compose".to_string(),
        args: vec!["compose".to_string()],
        working_dir: std::env::temp_dir(),
    };

    let (output, exit) = collect(&command).await;
    assert!(output.is_empty());
    assert!(matches!(exit, ProcessExit::SpawnFailed(_)));
}
