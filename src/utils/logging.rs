/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use tracing::info;

/// 记录程序启动信息
///
/// # 参数
/// - `exam_model`: 出题使用的模型名称
/// - `search_enabled`: 是否配置了搜索密钥
pub fn log_startup(exam_model: &str, search_enabled: bool) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 练习试卷生成模式");
    info!("📊 出题模型: {}", exam_model);
    if search_enabled {
        info!("🔍 资料补充: 已启用");
    } else {
        info!("🔍 资料补充: 未配置搜索密钥，将仅使用用户资料");
    }
    info!("{}", "=".repeat(60));
}

/// 记录生成完成统计
///
/// # 参数
/// - `exam_name`: 试卷名称
/// - `mc_count`: 选择题数量
/// - `oe_count`: 开放题数量
pub fn log_generation_summary(exam_name: &str, mc_count: usize, oe_count: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 试卷生成完成");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("📝 试卷名称: {}", exam_name);
    info!("✅ 选择题: {} 道", mc_count);
    info!("✅ 开放题: {} 道", oe_count);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
