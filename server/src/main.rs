use clap::Parser;
use log::{error, info};
use server::directory::{CredentialStore, Directory};
use server::instructor;
use server::network::Server;
use server::state::{ExamFiles, ExamState};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = shared::SERVER_PORT)]
    port: u16,

    /// Question bank file
    #[arg(short, long, default_value = "questions_with_difficulty.txt")]
    questions: PathBuf,

    /// Append-only result log
    #[arg(short, long, default_value = "results.txt")]
    results: PathBuf,

    /// Exam rules file
    #[arg(long, default_value = "rules.txt")]
    rules: PathBuf,

    /// Student directory (name roll reg_no password per line)
    #[arg(long, default_value = "student_dtls.txt")]
    students: PathBuf,

    /// Instructor directory (name id password per line)
    #[arg(long, default_value = "instructor_dtls.txt")]
    instructors: PathBuf,

    /// Instructor ID; prompted for when absent
    #[arg(short, long)]
    instructor_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let credentials: Arc<dyn CredentialStore> =
        Arc::new(Directory::load(&args.students, &args.instructors)?);

    let instructor_name = {
        let credentials = Arc::clone(&credentials);
        let instructor_id = args.instructor_id.clone();
        tokio::task::spawn_blocking(move || {
            let stdin = std::io::stdin();
            let mut input = stdin.lock();
            let mut output = std::io::stdout();
            instructor::login(credentials.as_ref(), instructor_id, &mut input, &mut output)
        })
        .await??
    };
    let Some(instructor_name) = instructor_name else {
        error!("Instructor login failed");
        return Err("invalid instructor credentials".into());
    };
    println!("Welcome, {}", instructor_name);

    let exam = Arc::new(ExamState::load(
        credentials,
        ExamFiles {
            questions: args.questions,
            results: args.results,
            rules: args.rules,
        },
    )?);

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, exam).await?;

    // Console reads stdin on its own thread and talks to the server loop
    let commands = server.command_sender();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        let mut output = std::io::stdout();
        if let Err(e) = instructor::run_console(&mut input, &mut output, commands) {
            error!("Instructor console failed: {}", e);
        }
    });

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }

    Ok(())
}
