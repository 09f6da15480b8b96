use anyhow::Result;
use clap::Parser;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

mod config;
mod error;
mod events;
mod morse;
mod services;
mod utils;

use config::{Config, DecodeMode};
use morse::MorseEngine;
use services::{create_keyboard_listener, InputInjector, ModifierState, VirtualDevice};

#[derive(Parser, Debug)]
#[command(name = "morsekey")]
#[command(about = "Утилита для ввода текста азбукой Морзе через перехват двух клавиш")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "morsekey.toml")]
    config: String,

    /// Режим сухого запуска (без реальных действий)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Инициализация системы логирования
    init_tracing(&args.log_level)?;

    info!("Запуск MorseKey v{}", env!("CARGO_PKG_VERSION"));

    // Загрузка конфигурации
    let config = Arc::new(Config::load(&args.config)?);
    info!("Конфигурация загружена из: {}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска - реальные действия отключены");
    }

    // Проверка прав доступа
    utils::permissions::check_permissions()?;

    // Инициализация компонентов: общее состояние модификаторов, единое
    // виртуальное устройство для инъекции и движок сегментации. Инжектор
    // читает модификаторы при печати, чтобы учесть активные CapsLock/Shift
    let modifier_state = Arc::new(RwLock::new(ModifierState::new()));
    let injector: Arc<dyn InputInjector> = Arc::new(VirtualDevice::new(
        "MorseKey Virtual Device",
        modifier_state.clone(),
        args.dry_run,
    )?);
    let running = Arc::new(AtomicBool::new(true));

    let engine = Arc::new(MorseEngine::new(
        config.clone(),
        injector.clone(),
        modifier_state.clone(),
        running.clone(),
    ));
    let keyboard_listener = create_keyboard_listener(
        config.clone(),
        engine.clone(),
        injector.clone(),
        modifier_state.clone(),
        running.clone(),
        args.dry_run,
    )?;

    info!("Все компоненты инициализированы");
    log_startup_banner(&config);

    // Запуск всех сервисов параллельно
    let keyboard_handle = tokio::spawn(async move {
        if let Err(e) = keyboard_listener.run().await {
            error!("Ошибка в KeyboardListener: {}", e);
        }
    });
    let monitor_handle = tokio::spawn(engine.clone().run_monitor());

    info!("Все сервисы запущены");

    // Завершение: Ctrl+C либо клавиша выхода (кооперативный флаг running)
    tokio::select! {
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
                Err(err) => error!("Ошибка при ожидании сигнала завершения: {}", err),
            }
            running.store(false, Ordering::SeqCst);
        }
        _ = wait_for_stop(running.clone()) => {
            info!("Получен запрос на выход с клавиатуры");
        }
    }

    info!("Завершение работы...");

    // Прерываем слушатель, чтобы гарантированно освободить grab в Drop;
    // недобранная буква отбрасывается, не коммитится
    keyboard_handle.abort();

    // Ожидаем завершения задач (с таймаутом)
    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    let shutdown_result = tokio::time::timeout(shutdown_timeout, async {
        let _ = keyboard_handle.await;
        let _ = monitor_handle.await;
    })
    .await;

    match shutdown_result {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    info!("MorseKey завершил работу");
    Ok(())
}

/// Ждать, пока клавиша выхода не сбросит флаг running
async fn wait_for_stop(running: Arc<AtomicBool>) {
    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}

// Информация для оператора о текущем режиме
fn log_startup_banner(config: &Config) {
    match config.resolved().mode {
        DecodeMode::Tap => info!(
            "Morse hook активен (режим TAP): '{}' - точка, '{}' - тире",
            config.keys.dot, config.keys.dash
        ),
        DecodeMode::Duration => info!(
            "Morse hook активен (режим DURATION): короткое удержание - точка, долгое - тире (порог {} мс)",
            config.decode.dash_threshold_ms
        ),
    }

    if let Some(commit) = &config.keys.commit {
        info!("Клавиша немедленного коммита: '{}'", commit);
    }

    info!(
        "Пауза буквы: {} мс, пауза слова: {} мс. Нажмите '{}' для выхода",
        config.decode.letter_timeout_ms, config.decode.word_timeout_ms, config.keys.exit
    );
}

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .init();

    Ok(())
}
