use std::future::Future;
use std::time::Duration;

use log::error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

const ACTOR_CHANNEL_SIZE: usize = 8;

/// A single-threaded state machine that processes messages one at a time.
///
/// The actor never blocks in its handlers. Long-running work is spawned via
/// [`ActorContext::spawn`] and reports back by sending messages to the actor.
pub trait Actor: Sized + Send + 'static {
    type Message: Send + 'static;
    type Options: Send + 'static;

    fn new(options: Self::Options) -> Self;
    fn start(&mut self, ctx: &mut ActorContext<Self>);
    fn receive(&mut self, ctx: &mut ActorContext<Self>, message: Self::Message) -> ActorAction;
    fn stop(self, ctx: &mut ActorContext<Self>);
}

pub enum ActorAction {
    Continue,
    /// Logs the message as an error and stops the actor.
    Fail(String),
    Stop,
}

pub struct ActorHandle<T>
where
    T: Actor,
{
    sender: mpsc::Sender<T::Message>,
    stopped: watch::Receiver<bool>,
}

impl<T> Clone for ActorHandle<T>
where
    T: Actor,
{
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            stopped: self.stopped.clone(),
        }
    }
}

impl<T: Actor> ActorHandle<T> {
    pub fn new(options: T::Options) -> Self {
        let (tx, mut rx) = mpsc::channel(ACTOR_CHANNEL_SIZE);
        let (stopped_tx, stopped_rx) = watch::channel::<bool>(false);
        let out = Self {
            sender: tx,
            stopped: stopped_rx,
        };
        let handle = out.clone();
        tokio::spawn(async move {
            let mut actor = T::new(options);
            let mut ctx = ActorContext::new(handle);
            actor.start(&mut ctx);
            while let Some(message) = rx.recv().await {
                let action = actor.receive(&mut ctx, message);
                ctx.reap();
                match action {
                    ActorAction::Continue => {}
                    ActorAction::Fail(message) => {
                        error!("{message}");
                        break;
                    }
                    ActorAction::Stop => {
                        break;
                    }
                }
            }
            actor.stop(&mut ctx);
            // Dropping the context aborts the tasks the actor has spawned.
            drop(ctx);
            drop(rx);
            let _ = stopped_tx.send(true);
        });
        out
    }

    pub async fn send(&self, message: T::Message) -> Result<(), mpsc::error::SendError<T::Message>> {
        self.sender.send(message).await
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }

    pub async fn wait_for_stop(mut self) {
        // We ignore the receiver error since the sender must have been dropped in this case,
        // which means the actor has stopped.
        let _ = self.stopped.wait_for(|x| *x).await;
    }
}

/// The context available to an actor while it handles a message.
pub struct ActorContext<T: Actor> {
    handle: ActorHandle<T>,
    tasks: JoinSet<()>,
}

impl<T: Actor> ActorContext<T> {
    fn new(handle: ActorHandle<T>) -> Self {
        Self {
            handle,
            tasks: JoinSet::new(),
        }
    }

    pub fn handle(&self) -> &ActorHandle<T> {
        &self.handle
    }

    /// Spawns a task that lives no longer than the actor.
    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    /// Sends a message to the actor itself.
    /// The message is delivered after the current message has been handled.
    pub fn send(&mut self, message: T::Message) {
        let handle = self.handle.clone();
        self.spawn(async move {
            let _ = handle.send(message).await;
        });
    }

    /// Sends a message to the actor itself after the delay.
    pub fn send_with_delay(&mut self, message: T::Message, delay: Duration) {
        let handle = self.handle.clone();
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = handle.send(message).await;
        });
    }

    fn reap(&mut self) {
        while self.tasks.try_join_next().is_some() {}
    }
}

/// Keeps track of spawned actors so that the owner can wait for all of them to stop.
#[derive(Default)]
pub struct ActorSystem {
    stopped: Vec<watch::Receiver<bool>>,
}

impl ActorSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<T: Actor>(&mut self, options: T::Options) -> ActorHandle<T> {
        let handle = ActorHandle::<T>::new(options);
        self.stopped.push(handle.stopped.clone());
        handle
    }

    pub async fn join(&mut self) {
        for mut stopped in self.stopped.drain(..) {
            let _ = stopped.wait_for(|x| *x).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::oneshot;

    use super::*;

    struct TestActor {
        count: usize,
    }

    enum TestMessage {
        Echo {
            value: String,
            reply: oneshot::Sender<String>,
        },
        Increment,
        IncrementLater {
            delay: Duration,
        },
        Count {
            reply: oneshot::Sender<usize>,
        },
        Fail,
        Stop,
    }

    impl Actor for TestActor {
        type Message = TestMessage;
        type Options = ();

        fn new(_options: Self::Options) -> Self {
            Self { count: 0 }
        }

        fn start(&mut self, _: &mut ActorContext<Self>) {}

        fn receive(&mut self, ctx: &mut ActorContext<Self>, message: TestMessage) -> ActorAction {
            match message {
                TestMessage::Echo { value, reply } => {
                    let _ = reply.send(value.to_uppercase());
                    ActorAction::Continue
                }
                TestMessage::Increment => {
                    self.count += 1;
                    ActorAction::Continue
                }
                TestMessage::IncrementLater { delay } => {
                    ctx.send_with_delay(TestMessage::Increment, delay);
                    ActorAction::Continue
                }
                TestMessage::Count { reply } => {
                    let _ = reply.send(self.count);
                    ActorAction::Continue
                }
                TestMessage::Fail => ActorAction::Fail("test failure".to_string()),
                TestMessage::Stop => ActorAction::Stop,
            }
        }

        fn stop(self, _: &mut ActorContext<Self>) {}
    }

    async fn count(handle: &ActorHandle<TestActor>) -> usize {
        let (tx, rx) = oneshot::channel();
        assert!(handle.send(TestMessage::Count { reply: tx }).await.is_ok());
        rx.await.unwrap()
    }

    #[tokio::test]
    async fn test_actor_handle_send() {
        let handle = ActorHandle::<TestActor>::new(());
        assert!(!handle.sender.is_closed());
        let (tx, rx) = oneshot::channel();
        let result = handle
            .send(TestMessage::Echo {
                value: "hello".to_string(),
                reply: tx,
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(rx.await, Ok("HELLO".to_string()));
    }

    #[tokio::test]
    async fn test_actor_handle_wait_for_stop() {
        let handle = ActorHandle::<TestActor>::new(());
        let result = handle.send(TestMessage::Stop).await;
        assert!(result.is_ok());

        handle.clone().wait_for_stop().await;
        // Multiple handles should be able to wait for the actor to stop.
        assert!(handle.is_stopped());
        handle.wait_for_stop().await;
    }

    #[tokio::test]
    async fn test_actor_fail_stops_actor() {
        let handle = ActorHandle::<TestActor>::new(());
        assert!(handle.send(TestMessage::Fail).await.is_ok());
        handle.clone().wait_for_stop().await;
        assert!(handle.send(TestMessage::Increment).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_actor_context_send_with_delay() {
        let handle = ActorHandle::<TestActor>::new(());
        let delay = Duration::from_secs(10);
        assert!(handle
            .send(TestMessage::IncrementLater { delay })
            .await
            .is_ok());
        assert_eq!(count(&handle).await, 0);
        tokio::time::sleep(delay + Duration::from_secs(1)).await;
        assert_eq!(count(&handle).await, 1);
    }

    #[tokio::test]
    async fn test_actor_system_join() {
        let mut system = ActorSystem::new();
        let first = system.spawn::<TestActor>(());
        let second = system.spawn::<TestActor>(());
        assert!(first.send(TestMessage::Stop).await.is_ok());
        assert!(second.send(TestMessage::Stop).await.is_ok());
        system.join().await;
        assert!(first.is_stopped());
        assert!(second.is_stopped());
    }
}
