// pseudomem: run a pseudocode program from the terminal

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Component, Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::style::Stylize;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use pseudomem::interpreter::{Host, Interpreter, InterpreterConfig, RunOutcome, StepControl};
use pseudomem::parser::ast::DataType;
use pseudomem::snapshot::{OutputKind, OutputLine, Snapshot};

#[derive(ClapParser, Debug)]
#[command(name = "pseudomem")]
#[command(about = "Run Cambridge-style pseudocode with a simulated memory arena", long_about = None)]
struct Cli {
    /// Program source file
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Pause before each statement (any key steps, q stops)
    #[arg(long)]
    debug: bool,

    /// Echo WRITEFILE lines to the output
    #[arg(long)]
    echo_files: bool,

    #[arg(long, value_name = "N", default_value_t = InterpreterConfig::default().max_iterations)]
    max_iterations: u64,

    #[arg(long, value_name = "N", default_value_t = InterpreterConfig::default().max_recursion_depth)]
    max_depth: usize,

    #[arg(long, value_name = "N", default_value_t = InterpreterConfig::default().arena_size)]
    arena_size: usize,

    /// Print the operation trace after the run
    #[arg(long)]
    trace: bool,

    /// Hex dump of the arena after the run (START may be 0x-prefixed)
    #[arg(long, num_args = 2, value_names = ["START", "LEN"], value_parser = parse_number)]
    dump: Option<Vec<u64>>,

    /// Directory for files opened FOR READ and written FOR WRITE/APPEND
    #[arg(long, value_name = "DIR")]
    files_dir: Option<PathBuf>,
}

fn parse_number(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    };
    parsed.map_err(|e| format!("'{}' is not a number: {}", s, e))
}

/// Host backed by stdin/stdout and the file system
struct TerminalHost {
    files_dir: Option<PathBuf>,
}

/// Resolve a program-supplied file name inside `dir`. Absolute names, `..`
/// and anything else that could leave the directory are refused.
fn path_in_dir(dir: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name);
    let mut components = relative.components().peekable();
    components.peek()?;
    components
        .all(|c| matches!(c, Component::Normal(_)))
        .then(|| dir.join(relative))
}

impl TerminalHost {
    fn file_path(&self, name: &str) -> Option<PathBuf> {
        let dir = self.files_dir.as_deref().unwrap_or(Path::new("."));
        path_in_dir(dir, name)
    }

    fn wait_for_step(&self) -> io::Result<StepControl> {
        enable_raw_mode()?;
        let control = loop {
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break Ok(StepControl::Stop),
                    _ => break Ok(StepControl::Continue),
                },
                Ok(_) => continue,
                Err(e) => break Err(e),
            }
        };
        disable_raw_mode()?;
        control
    }
}

impl Host for TerminalHost {
    fn emit(&mut self, line: &OutputLine) {
        match line.kind {
            OutputKind::Output => println!("{}", line.text),
            OutputKind::FileWrite => println!("{}", format!("[file] {}", line.text).dark_grey()),
            // The terminal already shows what was typed
            OutputKind::InputEcho => {}
        }
    }

    fn request_input(&mut self, name: &str, data_type: &DataType) -> Option<String> {
        eprint!("{}", format!("{} ({})? ", name, data_type).cyan());
        io::stderr().flush().ok()?;

        let mut buffer = String::new();
        match io::stdin().lock().read_line(&mut buffer) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(buffer.trim_end_matches(['\r', '\n']).to_string()),
        }
    }

    fn step(&mut self, snapshot: &Snapshot) -> StepControl {
        let location = match snapshot.current_callable() {
            Some(name) => format!("line {} in {}", snapshot.line, name),
            None => format!("line {}", snapshot.line),
        };
        eprintln!("{}", location.yellow().bold());
        for (name, var) in &snapshot.variables {
            eprintln!("  {} = {}", name, var);
        }

        match self.wait_for_step() {
            Ok(control) => control,
            Err(e) => {
                log::warn!("cannot read a step key ({}); continuing without stepping", e);
                StepControl::Continue
            }
        }
    }

    fn request_file(&mut self, name: &str) -> Option<String> {
        let Some(path) = self.file_path(name) else {
            log::warn!("refusing to open '{}': not a plain relative file name", name);
            return None;
        };
        match fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(e) => {
                log::debug!("cannot read {}: {}", path.display(), e);
                None
            }
        }
    }
}

fn main() -> Result<ExitCode> {
    env_logger::init();
    let cli = Cli::parse();

    let source = fs::read_to_string(&cli.file)
        .with_context(|| format!("cannot read {}", cli.file.display()))?;

    let program = match pseudomem::parser::parse(&source) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{}", e.to_string().red().bold());
            return Ok(ExitCode::FAILURE);
        }
    };

    let config = InterpreterConfig {
        arena_size: cli.arena_size,
        max_iterations: cli.max_iterations,
        max_recursion_depth: cli.max_depth,
        debug: cli.debug,
        echo_file_writes: cli.echo_files,
        ..InterpreterConfig::default()
    };

    let mut host = TerminalHost {
        files_dir: cli.files_dir.clone(),
    };
    let mut interpreter = Interpreter::new(program, config);
    let result = interpreter.run(&mut host);

    // State collected before a failure is still reported
    if let Some(dir) = &cli.files_dir {
        save_files(&interpreter, dir)?;
    }
    if cli.trace {
        print_trace(&interpreter);
    }
    if let Some(range) = &cli.dump {
        if let [start, len] = range.as_slice() {
            eprintln!("{}", interpreter.arena().hex_dump(*start, *len as usize));
        }
    }

    match result {
        Ok(RunOutcome::Completed) => Ok(ExitCode::SUCCESS),
        Ok(RunOutcome::Cancelled) => {
            eprintln!("{}", "Stopped.".yellow());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", e.to_string().red().bold());
            for frame in interpreter.call_stack().iter().rev() {
                eprintln!("  in {} {} (line {})", frame.kind, frame.name, frame.line);
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn save_files(interpreter: &Interpreter, dir: &Path) -> Result<()> {
    for (name, buffer) in interpreter.files().modified() {
        let Some(path) = path_in_dir(dir, name) else {
            eprintln!(
                "{}",
                format!("not saving '{}': file names must stay inside {}", name, dir.display()).yellow()
            );
            continue;
        };
        fs::write(&path, buffer.contents())
            .with_context(|| format!("cannot write {}", path.display()))?;
        log::info!("wrote {}", path.display());
    }
    Ok(())
}

fn print_trace(interpreter: &Interpreter) {
    let tracer = interpreter.tracer();
    for entry in tracer.entries() {
        eprintln!("{}", entry);
    }

    let stats = tracer.stats();
    eprintln!("{}", format!("{} operation(s)", stats.total).bold());
    for (kind, count) in &stats.counts {
        eprintln!("  {:<14} {}", kind, count);
    }
    if tracer.is_truncated() {
        eprintln!("{}", "trace limit reached; later operations were not recorded".yellow());
    }

    let arena = interpreter.arena().stats();
    eprintln!(
        "arena: {} of {} slots in use, {} live block(s), watermark 0x{:04x}",
        arena.used_slots, arena.size, arena.live_blocks, arena.watermark
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names_resolve_inside_the_directory() {
        let dir = Path::new("out");
        assert_eq!(path_in_dir(dir, "scores.txt"), Some(dir.join("scores.txt")));
        assert_eq!(
            path_in_dir(dir, "data/scores.txt"),
            Some(dir.join("data").join("scores.txt"))
        );
    }

    #[test]
    fn test_names_that_leave_the_directory_are_refused() {
        let dir = Path::new("out");
        for name in ["", "..", "../secret.txt", "data/../../x", "/etc/passwd", "./x"] {
            assert_eq!(path_in_dir(dir, name), None, "{:?} should be refused", name);
        }
    }
}
