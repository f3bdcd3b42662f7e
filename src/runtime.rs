//! 同步阻塞桥
//!
//! 控制循环是单线程同步的；异步的能力和 LLM 客户端通过 block_on 跑完再返回。
//! 不在 tokio 运行时内时直接在当前线程建 current-thread 运行时；
//! 已在运行时内（例如调用方自己是 #[tokio::main]）时换到一个作用域线程上跑，避免嵌套 block_on 导致 panic。

use std::future::Future;
use std::io;

fn run_to_completion<F: Future>(future: F) -> io::Result<F::Output> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(rt.block_on(future))
}

/// 阻塞执行 future 直到完成
pub fn block_on<F>(future: F) -> io::Result<F::Output>
where
    F: Future + Send,
    F::Output: Send,
{
    if tokio::runtime::Handle::try_current().is_err() {
        return run_to_completion(future);
    }
    std::thread::scope(|s| {
        match s.spawn(move || run_to_completion(future)).join() {
            Ok(out) => out,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    })
}
