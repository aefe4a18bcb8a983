use futures::FutureExt;
use log::error;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

type SyncCallback<T> = Arc<dyn Fn(T) + Send + Sync>;
type AsyncCallback<T> = Arc<dyn Fn(T) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// 生成唯一 ID
fn generate_id() -> u64 {
    use std::sync::atomic::AtomicU64;
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

fn log_panic(panic_value: Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic_value.downcast_ref::<String>() {
        format!("Panic message: {}", msg)
    } else if let Some(msg) = panic_value.downcast_ref::<&str>() {
        format!("Panic message: {}", msg)
    } else {
        format!("Panic value type_id={:?}", (*panic_value).type_id())
    }
}

/// **通用的同步/异步回调类型**
enum CallbackFn<T> {
    Sync(SyncCallback<T>),
    Async(AsyncCallback<T>),
}

#[derive(Clone, Default)]
pub enum TListener {
    #[default]
    Simple,
    Count(Arc<AtomicUsize>),
    Once(Arc<AtomicBool>),
}

impl TListener {
    pub fn count(count: usize) -> Self {
        TListener::Count(Arc::new(AtomicUsize::new(count)))
    }

    pub fn once() -> Self {
        TListener::Once(Arc::new(AtomicBool::new(false)))
    }

    fn exhausted(&self) -> bool {
        matches!(self, TListener::Count(counter) if counter.load(Ordering::Relaxed) == 0)
    }
}

/// **通用的监听器包装器**
///
/// 每个监听器持有自己的队列, `invoke` 只负责投递, 回调在监听器自己的任务里按顺序执行.
struct ListenerWrapper<T> {
    id: u64,
    t_callback: TListener,
    sink: mpsc::UnboundedSender<T>,
    is_removed: Arc<AtomicBool>,
}

impl<T> Clone for ListenerWrapper<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            t_callback: self.t_callback.clone(),
            sink: self.sink.clone(),
            is_removed: self.is_removed.clone(),
        }
    }
}

impl<T> ListenerWrapper<T> {
    fn new(id: u64, t_callback: TListener, sink: mpsc::UnboundedSender<T>) -> Self {
        Self {
            id,
            t_callback,
            sink,
            is_removed: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// 消耗一次listener wrapper，返回true表示次数耗尽，需要remove listener
fn consume_wrapper<T>(wrapper: &ListenerWrapper<T>) -> bool {
    if wrapper.is_removed.load(Ordering::Relaxed) {
        return false;
    }

    let should_remove = match &wrapper.t_callback {
        TListener::Simple => false,
        TListener::Count(counter) => {
            let old = counter.fetch_sub(1, Ordering::SeqCst);
            old == 1 // 初值为 0 的 counter 在注册时已被过滤
        }
        TListener::Once(consumed) => !consumed.swap(true, Ordering::SeqCst),
    };

    if should_remove {
        wrapper.is_removed.store(true, Ordering::Relaxed);
    }
    should_remove
}

async fn drain<T: Send + 'static>(
    id: u64,
    mut rx: mpsc::UnboundedReceiver<T>,
    callback: CallbackFn<T>,
) {
    while let Some(value) = rx.recv().await {
        let outcome = match &callback {
            CallbackFn::Sync(cb) => std::panic::catch_unwind(AssertUnwindSafe(|| cb(value))),
            CallbackFn::Async(cb) => AssertUnwindSafe(cb(value)).catch_unwind().await,
        };
        if let Err(panic_value) = outcome {
            error!("listener {} panicked: {}", id, log_panic(panic_value));
        }
    }
}

/// Fan-out event with per-listener FIFO delivery.
pub struct Event<T> {
    listeners: Arc<Mutex<Vec<ListenerWrapper<T>>>>,
}

impl<T> Event<T>
where
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn register(&self, t_callback: TListener) -> Option<(u64, mpsc::UnboundedReceiver<T>)> {
        if t_callback.exhausted() {
            return None;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let id = generate_id();
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ListenerWrapper::new(id, t_callback, tx));
        Some((id, rx))
    }

    fn spawn_listener(&self, t_callback: TListener, callback: CallbackFn<T>) -> Option<u64> {
        // 回调任务需要运行时
        let handle = tokio::runtime::Handle::try_current().ok()?;
        let (id, rx) = self.register(t_callback)?;
        handle.spawn(drain(id, rx, callback));
        Some(id)
    }

    pub fn add_sync_listener<F>(&self, callback: F, t_callback: TListener) -> Option<u64>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.spawn_listener(t_callback, CallbackFn::Sync(Arc::new(callback)))
    }

    pub fn add_async_listener<F, Fut>(&self, callback: F, t_callback: TListener) -> Option<u64>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.spawn_listener(
            t_callback,
            CallbackFn::Async(Arc::new(move |value| Box::pin(callback(value)))),
        )
    }

    /// Message-passing subscription: every invocation after this call is queued on the receiver.
    pub fn subscribe(&self) -> (u64, mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = generate_id();
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ListenerWrapper::new(id, TListener::Simple, tx));
        (id, rx)
    }

    pub fn remove_listener(&self, id: u64) -> bool {
        let mut guard = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = guard.iter().position(|w| w.id == id) {
            let removed_wrapper = guard.remove(pos);
            removed_wrapper.is_removed.store(true, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn invoke(&self, value: T) {
        let listeners_snapshot = {
            let guard = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            guard.clone()
        };

        for wrapper in listeners_snapshot.iter() {
            if wrapper.is_removed.load(Ordering::Relaxed) {
                continue;
            }

            let should_remove = consume_wrapper(wrapper);
            // 接收端已关闭的监听器顺手清理
            let closed = wrapper.sink.send(value.clone()).is_err();

            if should_remove || closed {
                self.remove_listener(wrapper.id);
            }
        }
    }
}

impl<T> Default for Event<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
