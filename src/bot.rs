use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::{BotConfig, Config, ConnectionConfig, Delivery, OnError};
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::message::{self, Message};
use crate::platform::slack::SlackApi;
use crate::platform::websocket::WebSocketConnector;
use crate::platform::{Connector, FrameSource, RichPoster, SessionInfo, SessionResolver};
use crate::registry::{Action, ActionContext, ActionSet, Registry};
use crate::session::Session;

/// Lifecycle of the realtime session
enum SessionState {
    Disconnected,
    Connecting(SessionInfo),
    Connected(Box<dyn FrameSource>),
    Terminated(Error),
}

/// A chat bot: registered actions plus the collaborators it talks through.
pub struct Bot {
    config: BotConfig,
    connection: ConnectionConfig,
    registry: Registry,
    resolver: Arc<dyn SessionResolver>,
    connector: Arc<dyn Connector>,
    poster: Arc<dyn RichPoster>,
}

impl Bot {
    /// Bot backed by the Slack Web API and a WebSocket transport.
    pub fn from_config(config: &Config) -> Self {
        let api = Arc::new(SlackApi::new(&config.slack));
        Self::with_platform(
            config.bot.clone(),
            config.connection.clone(),
            api.clone(),
            Arc::new(WebSocketConnector),
            api,
        )
    }

    pub fn with_platform(
        config: BotConfig,
        connection: ConnectionConfig,
        resolver: Arc<dyn SessionResolver>,
        connector: Arc<dyn Connector>,
        poster: Arc<dyn RichPoster>,
    ) -> Self {
        Self {
            config,
            connection,
            registry: Registry::new(),
            resolver,
            connector,
            poster,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run `action` for every routed message its pattern matches.
    pub fn hear(&mut self, action: Action) -> &mut Self {
        self.registry.register(ActionSet::Hear, action);
        self
    }

    /// Run `action` for messages addressed to the bot that its pattern matches.
    pub fn respond(&mut self, action: Action) -> &mut Self {
        self.registry.register(ActionSet::Respond, action);
        self
    }

    /// Bootstrap, connect, and process messages until a fatal error.
    ///
    /// Startup failures always end the run. Runtime transport failures end
    /// it too unless the connection policy is `reconnect`.
    pub async fn connect(self) -> Result<()> {
        let engine = Engine {
            name: self.config.name,
            fallback_reply: self.config.fallback_reply,
            delivery: self.config.delivery,
            connection: self.connection,
            registry: Arc::new(self.registry),
            resolver: self.resolver,
            connector: self.connector,
            dispatcher: Arc::new(Dispatcher::new(self.poster)),
        };
        engine.run().await
    }
}

struct Engine {
    name: String,
    fallback_reply: String,
    delivery: Delivery,
    connection: ConnectionConfig,
    registry: Arc<Registry>,
    resolver: Arc<dyn SessionResolver>,
    connector: Arc<dyn Connector>,
    dispatcher: Arc<Dispatcher>,
}

impl Engine {
    async fn run(&self) -> Result<()> {
        let mut state = SessionState::Disconnected;
        let mut session: Option<Session> = None;
        let mut backoff = self.connection.initial_backoff();
        let mut failed_attempts = 0u32;

        loop {
            state = match state {
                SessionState::Disconnected => match self.resolver.resolve_session().await {
                    Ok(info) => {
                        debug!("Connecting to {}", info.endpoint);
                        SessionState::Connecting(info)
                    }
                    Err(e) => {
                        self.after_failure(e, session.is_some(), &mut backoff, &mut failed_attempts)
                            .await
                    }
                },
                SessionState::Connecting(info) => match self.connector.connect(&info.endpoint).await
                {
                    Ok(transport) => {
                        let session = session.get_or_insert_with(|| self.new_session(&info));
                        if session.self_id() != info.self_id {
                            warn!(
                                "Bootstrap returned identity {}, keeping {}",
                                info.self_id,
                                session.self_id()
                            );
                        }
                        self.dispatcher.attach(transport.sink).await;
                        backoff = self.connection.initial_backoff();
                        failed_attempts = 0;
                        info!("{} ready as {}", self.name, session.self_id());
                        SessionState::Connected(transport.source)
                    }
                    Err(e) => {
                        self.after_failure(e, session.is_some(), &mut backoff, &mut failed_attempts)
                            .await
                    }
                },
                SessionState::Connected(mut source) => {
                    let e = match &session {
                        Some(session) => self.receive(session, source.as_mut()).await,
                        None => Error::NotConnected,
                    };
                    self.dispatcher.detach().await;
                    self.after_failure(e, session.is_some(), &mut backoff, &mut failed_attempts)
                        .await
                }
                SessionState::Terminated(e) => {
                    error!("{} terminated: {}", self.name, e);
                    return Err(e);
                }
            };
        }
    }

    fn new_session(&self, info: &SessionInfo) -> Session {
        Session::new(
            self.name.clone(),
            info.self_id.clone(),
            self.delivery,
            Arc::clone(&self.registry),
            Arc::clone(&self.dispatcher),
        )
    }

    /// Decide between terminating and another connection attempt.
    ///
    /// Only a session that has connected once may reconnect, and only for
    /// transport-level errors.
    async fn after_failure(
        &self,
        e: Error,
        established: bool,
        backoff: &mut Duration,
        failed_attempts: &mut u32,
    ) -> SessionState {
        let may_retry = self.connection.on_error == OnError::Reconnect
            && established
            && e.is_reconnectable()
            && *failed_attempts < self.connection.max_reconnect_attempts;
        if !may_retry {
            return SessionState::Terminated(e);
        }

        *failed_attempts += 1;
        warn!(
            "Connection lost ({}), reconnecting in {:?} (attempt {}/{})",
            e, backoff, failed_attempts, self.connection.max_reconnect_attempts
        );
        tokio::time::sleep(*backoff).await;
        *backoff = (*backoff * 2).min(self.connection.max_backoff());
        SessionState::Disconnected
    }

    /// Process frames one at a time until the connection fails.
    async fn receive(&self, session: &Session, source: &mut dyn FrameSource) -> Error {
        loop {
            let frame = match source.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => return Error::TransportClosed,
                Err(e) => return e,
            };

            let message = match message::normalize(&frame) {
                Ok(message) => message,
                Err(e) => return e,
            };

            self.route(session, message).await;
        }
    }

    /// Run every matching action for one message, then the fallback.
    async fn route(&self, session: &Session, message: Message) {
        if !message.is_user_message() {
            return;
        }
        if message.sender_id == session.self_id() {
            return;
        }
        debug!(
            "Message from {} in {}: {}",
            message.sender_id, message.channel_id, message.text
        );

        for found in self.registry.match_all(ActionSet::Hear, &message.text) {
            self.invoke(session, found.action, found.matches, &message).await;
        }

        if !session.is_addressed(&message.text) {
            return;
        }

        let responders = self.registry.match_all(ActionSet::Respond, &message.text);
        if responders.is_empty() {
            // Delivery failures are already logged by the dispatcher
            let _ = session.say(&message, &self.fallback_reply).await;
            return;
        }
        for found in responders {
            self.invoke(session, found.action, found.matches, &message).await;
        }
    }

    async fn invoke(
        &self,
        session: &Session,
        action: Action,
        matches: Vec<Vec<String>>,
        message: &Message,
    ) {
        let pattern = action.pattern().to_string();
        let ctx = ActionContext {
            action: action.clone(),
            matches,
            message: message.clone(),
        };
        if let Err(e) = action.invoke(session.clone(), ctx).await {
            warn!("Action '{}' failed: {:#}", pattern, e);
        }
    }
}
