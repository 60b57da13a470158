use std::env;
use std::fs;

use vimgolf_core::{count_keystrokes, create_initial_state, normalize_text, Engine};

/// 无头重放器：对初始缓冲区执行一串按键并打印结果。
///
/// 用法: vimgolf <file> <keystrokes>
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("usage: vimgolf <file> <keystrokes>");
        std::process::exit(2);
    }

    let text = fs::read_to_string(&args[1])?;
    let keystrokes = &args[2];

    let engine = Engine::new();
    let state = create_initial_state(&text);
    let state = engine.execute_keystrokes(&state, keystrokes);

    tracing::info!(
        keys = count_keystrokes(keystrokes),
        "replay finished"
    );
    print!("{}", normalize_text(&state.text()));
    Ok(())
}
