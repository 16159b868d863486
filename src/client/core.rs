use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dump_error::{ClientError, DumpResult};
use tracing::{debug, info};

use crate::{
    client::RespConnection,
    protocol::RespFrame,
    store::{DbIndex, KeyType, KeyspaceStore, StoreConnector},
};

/// Настройки клиента.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    /// Пароль для `AUTH` (необязательно)
    pub password: Option<String>,
    /// Имя пользователя ACL; используется только вместе с паролем
    pub username: Option<String>,
}

/// Клиент типизированных запросов поверх [`RespConnection`].
pub struct StoreClient {
    connection: RespConnection,
    authenticated: bool,
}

impl StoreClient {
    /// Подключается и, если задан пароль, проходит аутентификацию.
    pub async fn connect(
        addr: &str,
        config: &ClientConfig,
    ) -> DumpResult<Self> {
        debug!("Connecting to store at {addr}");

        let connection = RespConnection::connect(
            addr,
            config.connect_timeout,
            config.read_timeout,
            config.write_timeout,
        )
        .await?;

        let mut client = Self {
            connection,
            authenticated: false,
        };

        if let Some(password) = &config.password {
            client
                .authenticate(config.username.as_deref(), password)
                .await?;
        }

        Ok(client)
    }

    pub async fn authenticate(
        &mut self,
        username: Option<&str>,
        password: &str,
    ) -> DumpResult<()> {
        debug!("Authenticating");

        let mut args = vec!["AUTH"];
        args.extend(username);
        args.push(password);

        match self.connection.execute(&args).await? {
            RespFrame::Simple(_) => {
                self.authenticated = true;
                info!("Authenticated with {}", self.connection.server_addr());
                Ok(())
            }
            RespFrame::Error(msg) => Err(ClientError::AuthenticationFailed { reason: msg }.into()),
            other => Err(unexpected("AUTH", &other).into()),
        }
    }

    /// Отправляет запрос; ответ-ошибку превращает в `ServerError`.
    pub async fn execute<A: AsRef<[u8]>>(
        &mut self,
        args: &[A],
    ) -> DumpResult<RespFrame> {
        match self.connection.execute(args).await? {
            RespFrame::Error(message) => Err(ClientError::ServerError { message }.into()),
            frame => Ok(frame),
        }
    }

    pub async fn ping(&mut self) -> DumpResult<()> {
        match self.execute(&["PING"]).await? {
            RespFrame::Simple(s) if s == "PONG" => Ok(()),
            other => Err(unexpected("PING", &other).into()),
        }
    }

    pub fn server_addr(&self) -> &str {
        self.connection.server_addr()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub async fn close(self) -> DumpResult<()> {
        self.connection.close().await
    }

    async fn query_bulk_list(
        &mut self,
        command: &str,
        args: &[&[u8]],
    ) -> DumpResult<Vec<Bytes>> {
        let request: Vec<&[u8]> = std::iter::once(command.as_bytes())
            .chain(args.iter().copied())
            .collect();
        let frame = self.execute(request.as_slice()).await?;
        bulk_list(command, frame)
    }
}

#[async_trait]
impl KeyspaceStore for StoreClient {
    async fn key_type(
        &mut self,
        key: &[u8],
    ) -> DumpResult<KeyType> {
        match self.execute(&[b"TYPE".as_slice(), key]).await? {
            RespFrame::Simple(name) => Ok(KeyType::from(name.as_str())),
            other => Err(unexpected("TYPE", &other).into()),
        }
    }

    async fn get(
        &mut self,
        key: &[u8],
    ) -> DumpResult<Option<Bytes>> {
        match self.execute(&[b"GET".as_slice(), key]).await? {
            RespFrame::Bulk(None) => Ok(None),
            RespFrame::Bulk(Some(bytes)) => Ok(Some(Bytes::from(bytes))),
            other => Err(unexpected("GET", &other).into()),
        }
    }

    async fn lrange_all(
        &mut self,
        key: &[u8],
    ) -> DumpResult<Vec<Bytes>> {
        self.query_bulk_list("LRANGE", &[key, b"0", b"-1"]).await
    }

    async fn smembers(
        &mut self,
        key: &[u8],
    ) -> DumpResult<Vec<Bytes>> {
        self.query_bulk_list("SMEMBERS", &[key]).await
    }

    async fn hgetall(
        &mut self,
        key: &[u8],
    ) -> DumpResult<Vec<(Bytes, Bytes)>> {
        let flat = self.query_bulk_list("HGETALL", &[key]).await?;
        if flat.len() % 2 != 0 {
            return Err(ClientError::UnexpectedResponse {
                command: "HGETALL".to_string(),
                got: format!("odd number of elements ({})", flat.len()),
            }
            .into());
        }

        let mut pairs = Vec::with_capacity(flat.len() / 2);
        let mut items = flat.into_iter();
        while let (Some(field), Some(value)) = (items.next(), items.next()) {
            pairs.push((field, value));
        }
        Ok(pairs)
    }

    async fn zrange_with_scores(
        &mut self,
        key: &[u8],
    ) -> DumpResult<Vec<Bytes>> {
        self.query_bulk_list("ZRANGEBYSCORE", &[key, b"-inf", b"+inf", b"WITHSCORES"])
            .await
    }

    async fn ttl(
        &mut self,
        key: &[u8],
    ) -> DumpResult<i64> {
        match self.execute(&[b"TTL".as_slice(), key]).await? {
            RespFrame::Integer(ttl) => Ok(ttl),
            other => Err(unexpected("TTL", &other).into()),
        }
    }

    async fn keys(
        &mut self,
        pattern: &str,
    ) -> DumpResult<Vec<Bytes>> {
        self.query_bulk_list("KEYS", &[pattern.as_bytes()]).await
    }

    async fn keyspace_info(&mut self) -> DumpResult<String> {
        match self.execute(&["INFO", "keyspace"]).await? {
            RespFrame::Bulk(Some(bytes)) => Ok(utf8(bytes)?),
            other => Err(unexpected("INFO", &other).into()),
        }
    }

    async fn select(
        &mut self,
        db: DbIndex,
    ) -> DumpResult<()> {
        let db = db.to_string();
        match self.execute(&["SELECT", db.as_str()]).await? {
            RespFrame::Simple(_) => Ok(()),
            other => Err(unexpected("SELECT", &other).into()),
        }
    }
}

/// Открывает [`StoreClient`] к одному адресу.
#[derive(Debug, Clone)]
pub struct RespConnector {
    addr: String,
    config: ClientConfig,
}

impl RespConnector {
    pub fn new(
        addr: impl Into<String>,
        config: ClientConfig,
    ) -> Self {
        Self {
            addr: addr.into(),
            config,
        }
    }
}

#[async_trait]
impl StoreConnector for RespConnector {
    type Connection = StoreClient;

    async fn connect(&self) -> DumpResult<StoreClient> {
        StoreClient::connect(&self.addr, &self.config).await
    }

    fn endpoint(&self) -> String {
        self.addr.clone()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(10),
            password: None,
            username: None,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Разбор ответов
////////////////////////////////////////////////////////////////////////////////

/// Текстовые ответы (`INFO`) обязаны быть в UTF-8; ключи и значения не
/// декодируются.
fn utf8(bytes: Vec<u8>) -> Result<String, ClientError> {
    String::from_utf8(bytes).map_err(|e| ClientError::DecodingError {
        reason: format!("reply is not valid UTF-8: {e}"),
    })
}

/// Массив bulk-строк, байты передаются как есть.
fn bulk_list(
    command: &str,
    frame: RespFrame,
) -> DumpResult<Vec<Bytes>> {
    match frame {
        RespFrame::Array(None) => Ok(Vec::new()),
        RespFrame::Array(Some(items)) => items
            .into_iter()
            .map(|item| -> DumpResult<Bytes> {
                match item {
                    RespFrame::Bulk(Some(bytes)) => Ok(Bytes::from(bytes)),
                    other => Err(unexpected(command, &other).into()),
                }
            })
            .collect(),
        other => Err(unexpected(command, &other).into()),
    }
}

fn unexpected(
    command: &str,
    frame: &RespFrame,
) -> ClientError {
    ClientError::UnexpectedResponse {
        command: command.to_string(),
        got: frame.kind().to_string(),
    }
}
