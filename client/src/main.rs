use clap::Parser;
use client::error::ClientError;
use client::exam::{self, ExamTimer, OVERALL_EXAM_TIME};
use client::input;
use client::network::ExamClient;
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Roll number; prompted for when absent
    #[arg(short, long)]
    roll: Option<String>,

    /// Overall exam time in seconds
    #[arg(short, long, default_value_t = OVERALL_EXAM_TIME)]
    overall_time: u64,

    /// Seconds to wait for the instructor to start the exam
    #[arg(long, default_value = "300")]
    start_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut lines = input::spawn_stdin_reader();

    println!("\nWelcome to the online MCQ exam");
    let roll = match args.roll {
        Some(roll) => roll,
        None => input::prompt(&mut lines, "Roll No: ")
            .await
            .ok_or(ClientError::InputClosed)?,
    };
    let password = input::prompt(&mut lines, "Password: ")
        .await
        .ok_or(ClientError::InputClosed)?;

    let mut client = ExamClient::connect(&args.server).await?;
    let profile = match client.login(&roll, &password).await {
        Ok(profile) => profile,
        Err(ClientError::Rejected) => {
            println!("Invalid credentials! Exiting.");
            return Err(ClientError::Rejected.into());
        }
        Err(e) => return Err(e.into()),
    };
    println!("\nLogin successful. Welcome, {}!", profile.name);

    println!("\nWaiting for the instructor to start the exam...");
    client
        .wait_for_start(Duration::from_secs(args.start_timeout))
        .await?;
    let paper = client.receive_paper().await?;

    println!("\n================ RULES FOR THE EXAM ================");
    println!("Number of questions       : {}", paper.questions.len());
    println!("Time per question         : {} seconds", paper.config.answer_timeout);
    println!("Marks for correct answer  : {:.2}", paper.config.marks_correct);
    println!("Marks deducted when wrong : {:.2}", paper.config.marks_wrong);
    println!("Overall exam time         : {} seconds", args.overall_time);
    println!("====================================================");

    let timer = ExamTimer::start(Duration::from_secs(args.overall_time));
    let card = exam::conduct_exam(&paper, &mut lines, &timer).await;
    drop(timer);

    print!("{}", exam::render_summary(&card, paper.questions.len()));

    let result = card.into_result(&roll, &profile.name);
    client.submit(&result).await?;
    info!("Exam finished for {}", roll);

    println!("\nThank you for taking the exam. Goodbye!");
    Ok(())
}
