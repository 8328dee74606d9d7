use std::env;

use anyhow::Result;

use practice_exam_maker::models::ExamResponse;
use practice_exam_maker::utils::logging::{log_generation_summary, log_startup};
use practice_exam_maker::{
    Config, ExamGenerator, GenerationOutcome, GenerationRequest, MaterialRef,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    practice_exam_maker::logger::init();

    // 加载配置
    let config = Config::load()?;
    log_startup(&config.exam_model_name, !config.serpapi_key.is_empty());

    // 课程信息来自环境变量，学习资料来自命令行参数
    let course = env::var("EXAM_COURSE").unwrap_or_default();
    let school = env::var("EXAM_SCHOOL").unwrap_or_default();
    let topics = env::var("EXAM_TOPICS").unwrap_or_default();
    let username = env::var("EXAM_USER").unwrap_or_else(|_| "local".to_string());

    let mut files = Vec::new();
    for path in env::args().skip(1) {
        files.push(MaterialRef::from_path(&path)?);
    }

    // 初始化编排器并执行一次生成
    let generator = ExamGenerator::initialize(&config).await?;
    let outcome = generator
        .generate(GenerationRequest {
            username,
            files,
            course,
            school,
            topics,
            past_exam_names: Vec::new(),
        })
        .await?;

    match outcome {
        GenerationOutcome::Completed(exam) => {
            log_generation_summary(
                &exam.name,
                exam.multiple_choice_count(),
                exam.open_ended_count(),
            );
            let response = ExamResponse::from_exam("exam-1", exam);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        GenerationOutcome::InsufficientQuota => {
            eprintln!("配额不足，本次未生成试卷");
        }
    }

    Ok(())
}
