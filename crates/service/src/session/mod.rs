mod watchdog;

pub use watchdog::spawn_watchdog;

use ahash::HashMap;
use codec::Token;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpStream;
use tokio::sync::{Notify, mpsc, oneshot};

/// Number of watchdog ticks a session survives without making I/O
/// progress before it is considered dead.
pub const INITIAL_HP: u8 = 10;

#[derive(Debug)]
pub enum Error {
    /// the session a frame was queued for has already torn down its
    /// control connection.
    PeerGone,
    /// the handoff's sender was dropped before a socket arrived.
    HandoffDropped,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PeerGone => write!(f, "peer session is gone"),
            Self::HandoffDropped => write!(f, "handoff sender dropped before a socket arrived"),
        }
    }
}

impl std::error::Error for Error {}

pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Forward,
    Connect,
}

/// One live server-side connection.
///
/// `hp` is reset by [`Session::touch`] whenever the owning task makes
/// I/O progress and decremented by the watchdog spawned with
/// [`spawn_watchdog`]; reaching zero wakes anyone awaiting
/// [`Session::cancelled`].
pub struct Session {
    pub id: SessionId,
    pub role: Role,
    pub token: Token,
    hp: Mutex<u8>,
    cancel: Notify,
    handoff: Mutex<Option<oneshot::Sender<TcpStream>>>,
    outbox: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
}

impl Session {
    fn new(id: SessionId, role: Role, token: Token) -> Self {
        Self {
            id,
            role,
            token,
            hp: Mutex::new(INITIAL_HP),
            cancel: Notify::new(),
            handoff: Mutex::new(None),
            outbox: Mutex::new(None),
        }
    }

    /// Installs the channel this session's owning task reads alongside
    /// its own socket (in a `select!`) to receive frames another task
    /// wants written on this session's control connection -- the
    /// mechanism a connect session uses to deliver a CONNECT
    /// notification to the forward session it is paired with.
    pub fn set_outbox(&self, tx: mpsc::UnboundedSender<Vec<u8>>) {
        *self.outbox.lock() = Some(tx);
    }

    /// Queues `frame` for delivery on this session's control
    /// connection.
    pub fn send_frame(&self, frame: Vec<u8>) -> Result<(), Error> {
        match &*self.outbox.lock() {
            Some(tx) => tx.send(frame).map_err(|_| Error::PeerGone),
            None => Err(Error::PeerGone),
        }
    }

    pub fn touch(&self) {
        *self.hp.lock() = INITIAL_HP;
    }

    pub fn is_alive(&self) -> bool {
        *self.hp.lock() > 0
    }

    /// Resolves once the watchdog has zeroed this session's `hp`.
    /// Resolves immediately if it already has.
    pub async fn cancelled(&self) {
        if !self.is_alive() {
            return;
        }
        self.cancel.notified().await;
    }

    /// Forcibly zeroes `hp` and wakes anyone awaiting
    /// [`Session::cancelled`] -- used to evict a forward session that
    /// just lost a duplicate-token race to a newer login.
    pub fn kill(&self) {
        *self.hp.lock() = 0;
        self.cancel.notify_one();
    }

    fn expire(&self) {
        let mut hp = self.hp.lock();
        if *hp > 0 {
            *hp -= 1;
            if *hp == 0 {
                drop(hp);
                self.cancel.notify_one();
            }
        }
    }

    /// Registers this session (which must be the `Connect` side of a
    /// pairing) as waiting for an accepted socket and returns the
    /// receiving half of the one-shot handoff channel.
    ///
    /// ```
    /// use fsh_service::{Registry, Role};
    ///
    /// let registry = Registry::new();
    /// let token = codec::Token::generate();
    /// let session = registry.insert(Role::Connect, token);
    /// let _rx = session.prepare_handoff();
    /// ```
    pub fn prepare_handoff(&self) -> oneshot::Receiver<TcpStream> {
        let (tx, rx) = oneshot::channel();
        *self.handoff.lock() = Some(tx);
        rx
    }

    /// Hands `stream` to whoever is awaiting the receiver returned by
    /// [`Session::prepare_handoff`]. Returns the stream back to the
    /// caller if nobody is waiting (or the waiter already gave up),
    /// which the caller treats the same as a failed lookup.
    pub fn accept_handoff(&self, stream: TcpStream) -> Result<(), TcpStream> {
        match self.handoff.lock().take() {
            Some(tx) => tx.send(stream),
            None => Err(stream),
        }
    }
}

#[derive(Default)]
struct Table {
    sessions: HashMap<SessionId, Arc<Session>>,
    by_key: HashMap<(Role, Token), SessionId>,
}

/// The registry of live server sessions, indexed by id and by
/// `(role, token)`.
///
/// All mutation goes through a single lock; lookups return owned
/// `Arc<Session>` handles so callers never hold the lock across an
/// `.await`. A handle obtained before a suspension point may outlive
/// the session's presence in the registry (it was removed and
/// potentially replaced under a duplicate token) -- callers that need
/// current state after an await must re-look the token up rather than
/// trust a previously obtained handle.
pub struct Registry {
    table: Mutex<Table>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            table: Mutex::new(Table::default()),
            next_id: AtomicU64::new(1),
        })
    }

    fn allocate_id(&self) -> SessionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Inserts a new session for `role`/`token`. Does not enforce
    /// forward-session uniqueness; use [`Registry::login`] for that.
    pub fn insert(&self, role: Role, token: Token) -> Arc<Session> {
        let id = self.allocate_id();
        let session = Arc::new(Session::new(id, role, token));

        let mut table = self.table.lock();
        table.sessions.insert(id, session.clone());
        table.by_key.insert((role, token), id);

        session
    }

    /// Registers a new forward session for `token`, evicting and
    /// returning any prior forward session registered under the same
    /// token so the caller can wake it.
    pub fn login(&self, token: Token) -> (Arc<Session>, Option<Arc<Session>>) {
        let id = self.allocate_id();
        let session = Arc::new(Session::new(id, Role::Forward, token));

        let mut table = self.table.lock();
        let evicted = table
            .by_key
            .insert((Role::Forward, token), id)
            .and_then(|old_id| table.sessions.get(&old_id).cloned());

        table.sessions.insert(id, session.clone());
        (session, evicted)
    }

    pub fn find(&self, role: Role, token: Token) -> Option<Arc<Session>> {
        let table = self.table.lock();
        let id = *table.by_key.get(&(role, token))?;
        table.sessions.get(&id).cloned()
    }

    /// Removes a session. Safe to call with a stale id: a no-op if it
    /// is already gone, and will not disturb a newer session that has
    /// since claimed the same `(role, token)` key.
    pub fn remove(&self, id: SessionId) {
        let mut table = self.table.lock();
        if let Some(session) = table.sessions.remove(&id) {
            if table.by_key.get(&(session.role, session.token)) == Some(&id) {
                table.by_key.remove(&(session.role, session.token));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.table.lock().sessions.len()
    }

    /// Decrements every live session's `hp` by one; sessions whose
    /// `hp` reaches zero wake anyone awaiting [`Session::cancelled`].
    /// Called once per watchdog tick.
    pub fn tick(&self) {
        let table = self.table.lock();
        for session in table.sessions.values() {
            session.expire();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_login_evicts_prior_holder() {
        let registry = Registry::new();
        let token = Token::generate();

        let (first, evicted) = registry.login(token);
        assert!(evicted.is_none());
        assert!(first.is_alive());

        let (second, evicted) = registry.login(token);
        let evicted = evicted.expect("duplicate login should evict the prior session");
        assert_eq!(evicted.id, first.id);

        let found = registry.find(Role::Forward, token).unwrap();
        assert_eq!(found.id, second.id);
    }

    #[test]
    fn find_misses_unknown_token() {
        let registry = Registry::new();
        assert!(registry.find(Role::Forward, Token::generate()).is_none());
    }

    #[test]
    fn remove_does_not_disturb_a_replacement() {
        let registry = Registry::new();
        let token = Token::generate();

        let (first, _) = registry.login(token);
        let (second, _) = registry.login(token);

        registry.remove(first.id);

        let found = registry.find(Role::Forward, token).unwrap();
        assert_eq!(found.id, second.id);
    }

    #[tokio::test]
    async fn tick_to_zero_wakes_cancelled() {
        let registry = Registry::new();
        let session = registry.insert(Role::Connect, Token::generate());

        for _ in 0..INITIAL_HP {
            registry.tick();
        }

        tokio::time::timeout(std::time::Duration::from_secs(1), session.cancelled())
            .await
            .expect("cancelled() should resolve once hp reaches zero");
    }

    #[tokio::test]
    async fn touch_resets_hp_and_prevents_expiry() {
        let registry = Registry::new();
        let session = registry.insert(Role::Connect, Token::generate());

        for _ in 0..INITIAL_HP - 1 {
            registry.tick();
        }
        session.touch();
        registry.tick();

        assert!(session.is_alive());
    }

    #[tokio::test]
    async fn handoff_delivers_the_stream_once() {
        use tokio::net::{TcpListener, TcpStream};

        let registry = Registry::new();
        let session = registry.insert(Role::Connect, Token::generate());
        let rx = session.prepare_handoff();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = tokio::spawn(async move { listener.accept().await.unwrap().0 });
        let client = TcpStream::connect(addr).await.unwrap();
        let accepted = accepted.await.unwrap();
        let _ = client;

        session.accept_handoff(accepted).expect("a waiter is registered");
        let _stream = rx.await.expect("handoff channel should deliver the stream");
    }
}
