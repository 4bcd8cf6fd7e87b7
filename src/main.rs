use clap::Parser;
use invoke_local::core::output::render_result;
use invoke_local::utils::logger;
use invoke_local::{InvokeConfig, InvokeError, Invoker, ModuleResolver};
use std::io;

fn main() {
    let config = InvokeConfig::parse();

    // 初始化日誌
    logger::init_cli_logger();
    tracing::debug!("CLI config: {:?}", config);

    if let Err(e) = run(&config) {
        tracing::debug!(
            "❌ Invocation failed: {} (Kind: {}, Category: {:?})",
            e,
            e.kind(),
            e.category()
        );

        // stdout 保持空白，錯誤文件寫到 stderr
        let report = serde_json::to_value(e.report()).unwrap_or_default();
        eprintln!("{}", render_result(&report));
        eprintln!("💡 {}", e.recovery_suggestion());

        std::process::exit(e.exit_code());
    }
}

fn run(config: &InvokeConfig) -> Result<(), InvokeError> {
    let request = config.to_request()?;

    // 從執行 invoke 的目錄尋找模組
    let root = std::env::current_dir()?;
    let invoker = Invoker::new(ModuleResolver::new(root));

    invoker.run(&request, io::stdin().lock(), io::stdout().lock())
}
