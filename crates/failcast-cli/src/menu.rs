//! Interactive menu

use colored::Colorize;
use failcast_core::{FailcastConfig, Pipeline};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::fmt::{self, Display, Formatter};

use crate::commands;
use crate::render;

/// A valid menu selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MenuChoice {
    /// Zero-based index into the job list
    Job(usize),
    Analyze,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MenuInputError {
    NotANumber,
    OutOfRange(usize),
}

impl Display for MenuInputError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotANumber => f.write_str("Please enter a number"),
            Self::OutOfRange(max) => write!(f, "Invalid option; choose 1-{max}"),
        }
    }
}

/// Map input onto a choice; jobs are `1..=n`, then analysis, then exit
pub(crate) fn parse_choice(input: &str, job_count: usize) -> Result<MenuChoice, MenuInputError> {
    let n: usize = input
        .trim()
        .parse()
        .map_err(|_| MenuInputError::NotANumber)?;
    let max = job_count + 2;
    match n {
        0 => Err(MenuInputError::OutOfRange(max)),
        n if n <= job_count => Ok(MenuChoice::Job(n - 1)),
        n if n == job_count + 1 => Ok(MenuChoice::Analyze),
        n if n == max => Ok(MenuChoice::Exit),
        _ => Err(MenuInputError::OutOfRange(max)),
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Run the menu until the user exits, interrupts, or closes input
///
/// A failed prediction or analysis is reported and the menu continues.
pub(crate) async fn run(pipeline: &Pipeline, config: &FailcastConfig) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new()?;

    loop {
        let jobs = pipeline.store().list_jobs()?;
        print!("{}", render::format_menu(&jobs));

        let line = match editor.readline("\nSelect an option: ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        };
        if !line.trim().is_empty() {
            let _ = editor.add_history_entry(line.as_str());
        }

        match parse_choice(&line, jobs.len()) {
            Ok(MenuChoice::Job(index)) => {
                let job = &jobs[index].job_name;
                println!("\n{} {}...", "Analyzing".cyan(), job.bold());
                match pipeline.assess(job).await {
                    Ok(prediction) => {
                        print!("{}", render::format_assessment(&prediction.assessment));
                        match editor.readline("\nSave predictions to file? (y/n): ") {
                            Ok(answer) if is_yes(&answer) => {
                                match commands::save(config, &prediction) {
                                    Ok(path) => println!(
                                        "{} {}",
                                        "Saved to".green(),
                                        path.display()
                                    ),
                                    Err(err) => println!("{}", render::format_error(&err)),
                                }
                            }
                            Ok(_) => {}
                            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                            Err(err) => return Err(err.into()),
                        }
                    }
                    Err(err) => println!("{}", render::format_error(&err)),
                }
            }
            Ok(MenuChoice::Analyze) => commands::print_analysis(pipeline).await,
            Ok(MenuChoice::Exit) => break,
            Err(err) => println!("{}", err.to_string().red()),
        }
    }

    println!("{}", "Goodbye!".green());
    Ok(())
}
