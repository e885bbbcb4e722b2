//! Socket text protocol binding and client.
//!
//! Each connection carries any number of request/reply lines. A request that
//! fails to decode gets an `ERROR:` reply on the same connection; a framing
//! violation closes it.

use crate::cache::RecordCache;
use crate::config::{SocketConfig, DEFAULT_MAX_FRAME_LEN};
use crate::error::{ServerError, ServerResult};
use crate::framing::{read_line, write_line};
use crate::listener::{self, ServeHandle};
use medsync_core::{CoreError, RecordService};
use medsync_protocol::{Command, Record, RecordCodec, Reply};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, warn};

const BINDING: &str = "socket";

/// Translates socket lines into coordinator calls.
pub struct SocketProtocolBinding {
    service: Arc<dyn RecordService>,
    cache: Option<RecordCache>,
    max_frame_len: usize,
}

impl SocketProtocolBinding {
    /// Creates a binding without a records directory.
    pub fn new(service: Arc<dyn RecordService>) -> Self {
        Self {
            service,
            cache: None,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Backs `GET_RECORD`/`SEND_RECORD` with a records directory.
    pub fn with_cache(mut self, cache: RecordCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets the longest accepted request line.
    pub fn with_max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }

    /// Binds and starts serving.
    pub async fn start(
        service: Arc<dyn RecordService>,
        config: &SocketConfig,
    ) -> ServerResult<ServeHandle> {
        let mut binding = Self::new(service).with_max_frame_len(config.max_frame_len);
        if let Some(dir) = &config.records_dir {
            binding = binding.with_cache(RecordCache::open(dir).await?);
        }
        let listener = listener::bind(BINDING, config.bind_addr).await?;
        let binding = Arc::new(binding);
        listener::serve(BINDING, listener, config.max_connections, move |stream, peer| {
            let binding = Arc::clone(&binding);
            async move { binding.serve_connection(stream, peer).await }
        })
    }

    async fn serve_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let (read, mut write) = stream.into_split();
        let mut reader = BufReader::new(read);
        loop {
            let line = match read_line(&mut reader, self.max_frame_len).await {
                Ok(Some(line)) => line,
                Ok(None) => return,
                Err(e) => {
                    debug!(peer = %peer, error = %e, "closing socket connection");
                    return;
                }
            };
            let reply = self.handle_line(&line).await;
            if let Err(e) = write_line(&mut write, &reply.to_line()).await {
                debug!(peer = %peer, error = %e, "reply not delivered");
                return;
            }
        }
    }

    /// Answers one request line.
    pub async fn handle_line(&self, line: &str) -> Reply {
        match Command::parse(line) {
            Command::GetRecord { patient_id } => self.get_record(&patient_id).await,
            Command::SendRecord { payload } => self.save(&payload, None).await,
            Command::ReplicateRecord { origin, payload } => {
                self.save(&payload, Some(origin.as_str())).await
            }
            Command::Unknown(_) => Reply::unknown_command(),
        }
    }

    async fn get_record(&self, patient_id: &str) -> Reply {
        match self.service.get_record(patient_id).await {
            Ok(record) => Reply::Record(RecordCodec::encode(&record).into_string()),
            Err(e) if e.is_not_found() => match self.load_cached(patient_id).await {
                Some(record) => Reply::Record(RecordCodec::encode(&record).into_string()),
                None => Reply::not_found(),
            },
            Err(e) => Reply::Error(e.to_string()),
        }
    }

    async fn load_cached(&self, patient_id: &str) -> Option<Record> {
        let cache = self.cache.as_ref()?;
        match cache.load(patient_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(patient_id = %patient_id, error = %e, "cached record unreadable");
                None
            }
        }
    }

    /// Stores a decoded payload. Records from a peer (`origin` set) are
    /// replicated; everything else is synced and propagated.
    async fn save(&self, payload: &str, origin: Option<&str>) -> Reply {
        let record = match RecordCodec::decode_str(payload) {
            Ok(record) => record,
            Err(e) => return Reply::Error(e.to_string()),
        };
        let patient_id = record.patient_id().to_string();
        let fallback = record.clone();

        let stored = match origin {
            Some(origin) => self.service.replicate_record(record, origin).await,
            None => self.service.sync_record(record).await.map(|_| ()),
        };
        if let Err(e) = stored {
            return Reply::Error(e.to_string());
        }

        let reference = match &self.cache {
            Some(cache) => {
                let stored = self.service.get_record(&patient_id).await.unwrap_or(fallback);
                match cache.store(&stored).await {
                    Ok(path) => path.display().to_string(),
                    Err(e) => {
                        warn!(patient_id = %patient_id, error = %e, "record not cached");
                        memory_reference(&patient_id)
                    }
                }
            }
            None => memory_reference(&patient_id),
        };
        Reply::Saved { reference }
    }
}

fn memory_reference(patient_id: &str) -> String {
    format!("patient/{patient_id}")
}

/// A client connection to a socket binding.
pub struct SocketClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    max_frame_len: usize,
}

impl SocketClient {
    /// Connects, giving up after `timeout`.
    pub async fn connect(addr: &str, timeout: Duration) -> ServerResult<Self> {
        let stream = listener::connect(addr, timeout).await?;
        let (read, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read),
            writer,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        })
    }

    /// Sends one request and waits for its reply.
    pub async fn request(&mut self, command: &Command) -> ServerResult<Reply> {
        self.request_line(&command.to_line()).await
    }

    /// Sends a raw line and waits for the reply.
    pub async fn request_line(&mut self, line: &str) -> ServerResult<Reply> {
        write_line(&mut self.writer, line).await?;
        let reply = read_line(&mut self.reader, self.max_frame_len)
            .await?
            .ok_or_else(|| ServerError::Frame("connection closed before reply".into()))?;
        Ok(Reply::parse(&reply)?)
    }

    /// Fetches and decodes a record.
    pub async fn get_record(&mut self, patient_id: &str) -> ServerResult<Record> {
        let command = Command::GetRecord {
            patient_id: patient_id.to_string(),
        };
        match self.request(&command).await? {
            Reply::Record(xml) => Ok(RecordCodec::decode_str(&xml)?),
            reply if reply.is_not_found() => Err(CoreError::not_found(patient_id).into()),
            Reply::Error(message) => Err(ServerError::Rejected(message)),
            Reply::Saved { .. } => Err(ServerError::Rejected("unexpected SUCCESS reply".into())),
        }
    }

    /// Sends a record; returns the reference it was saved under.
    pub async fn send_record(&mut self, record: &Record) -> ServerResult<String> {
        let command = Command::SendRecord {
            payload: RecordCodec::encode(record).into_string(),
        };
        self.save(&command).await
    }

    /// Pushes a record on behalf of peer `origin`. The receiving node stores
    /// it without forwarding.
    pub async fn replicate_record(&mut self, origin: &str, record: &Record) -> ServerResult<String> {
        let command = Command::ReplicateRecord {
            origin: origin.to_string(),
            payload: RecordCodec::encode(record).into_string(),
        };
        self.save(&command).await
    }

    async fn save(&mut self, command: &Command) -> ServerResult<String> {
        match self.request(command).await? {
            Reply::Saved { reference } => Ok(reference),
            Reply::Error(message) => Err(ServerError::Rejected(message)),
            Reply::Record(_) => Err(ServerError::Rejected("unexpected RECORD reply".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medsync_core::{CoordinatorConfig, SyncCoordinator};
    use medsync_testkit::{record_for, record_strategy, RecordingPeerClient};
    use proptest::prelude::*;

    fn binding() -> (Arc<SyncCoordinator>, SocketProtocolBinding) {
        binding_with_peers(Arc::new(RecordingPeerClient::new()))
    }

    fn binding_with_peers(
        peers: Arc<RecordingPeerClient>,
    ) -> (Arc<SyncCoordinator>, SocketProtocolBinding) {
        let coordinator = Arc::new(SyncCoordinator::new(CoordinatorConfig::new("A"), peers));
        let binding = SocketProtocolBinding::new(coordinator.clone());
        (coordinator, binding)
    }

    #[tokio::test]
    async fn unknown_record_and_command() {
        let (_, binding) = binding();
        assert_eq!(
            binding.handle_line("GET_RECORD:UNKNOWN").await.to_line(),
            "ERROR: Record not found"
        );
        assert_eq!(
            binding.handle_line("FOO:bar").await.to_line(),
            "ERROR: Unknown command"
        );
        assert_eq!(binding.handle_line("").await.to_line(), "ERROR: Unknown command");
    }

    #[tokio::test]
    async fn send_then_get() {
        let (coordinator, binding) = binding();
        let record = record_for("PAT42");
        let line = format!("SEND_RECORD:{}", RecordCodec::encode(&record));

        let reply = binding.handle_line(&line).await;
        assert_eq!(reply.to_line(), "SUCCESS: Record saved as patient/PAT42");
        assert_eq!(coordinator.get_record("PAT42").unwrap(), record);

        match binding.handle_line("GET_RECORD:PAT42").await {
            Reply::Record(xml) => assert_eq!(RecordCodec::decode_str(&xml).unwrap(), record),
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[tokio::test]
    async fn replicated_record_is_not_pushed_on() {
        let peers = Arc::new(RecordingPeerClient::new());
        let (coordinator, binding) = binding_with_peers(peers.clone());
        coordinator.register_node("B", "socket://b:8888").unwrap();

        let record = record_for("PAT8");
        let line = format!("REPLICATE_RECORD:B:{}", RecordCodec::encode(&record));
        let reply = binding.handle_line(&line).await;
        assert_eq!(reply.to_line(), "SUCCESS: Record saved as patient/PAT8");
        assert_eq!(coordinator.get_record("PAT8").unwrap(), record);
        assert_eq!(peers.total(), 0);

        let line = format!("SEND_RECORD:{}", RecordCodec::encode(&record));
        binding.handle_line(&line).await;
        assert_eq!(peers.attempts("socket://b:8888"), 1);
    }

    #[tokio::test]
    async fn padded_fields_survive_send_and_get() {
        let (_, binding) = binding();
        let mut record = record_for("PAT9");
        record.patient.first_name = " Ann".into();
        record.patient.contact.phone = "555 ".into();

        let line = format!("SEND_RECORD:{}", RecordCodec::encode(&record));
        binding.handle_line(&line).await;
        match binding.handle_line("GET_RECORD:PAT9").await {
            Reply::Record(xml) => assert_eq!(RecordCodec::decode_str(&xml).unwrap(), record),
            other => panic!("unexpected reply {other:?}"),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn any_record_reads_back_as_sent(record in record_strategy()) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            let (_, binding) = binding();
            let line = format!("SEND_RECORD:{}", RecordCodec::encode(&record));
            let saved = runtime.block_on(binding.handle_line(&line));
            prop_assert!(matches!(saved, Reply::Saved { .. }), "{:?}", saved);

            let get = format!("GET_RECORD:{}", record.patient_id());
            match runtime.block_on(binding.handle_line(&get)) {
                Reply::Record(xml) => prop_assert_eq!(RecordCodec::decode_str(&xml).unwrap(), record),
                other => prop_assert!(false, "unexpected reply {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn invalid_payload_is_error_reply() {
        let (coordinator, binding) = binding();
        let reply = binding.handle_line("SEND_RECORD:<medicalRecord/>").await;
        assert!(matches!(reply, Reply::Error(ref m) if m.starts_with("decode error")));
        assert_eq!(coordinator.store().count(), 0);
    }

    #[tokio::test]
    async fn cache_read_and_write_through() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, binding) = binding();
        let binding = binding.with_cache(RecordCache::open(dir.path()).await.unwrap());

        let record = record_for("PAT42");
        let reply = binding
            .handle_line(&format!("SEND_RECORD:{}", RecordCodec::encode(&record)))
            .await;
        let expected = dir.path().join("PAT42.xml");
        assert_eq!(
            reply,
            Reply::Saved {
                reference: expected.display().to_string()
            }
        );
        assert!(expected.exists());

        // A document only present on disk is served without entering the store.
        let cached = record_for("PAT77");
        RecordCache::open(dir.path()).await.unwrap().store(&cached).await.unwrap();
        match binding.handle_line("GET_RECORD:PAT77").await {
            Reply::Record(xml) => assert_eq!(RecordCodec::decode_str(&xml).unwrap(), cached),
            other => panic!("unexpected reply {other:?}"),
        }
        assert!(coordinator.get_record("PAT77").is_err());
    }

    #[tokio::test]
    async fn uncachable_id_still_saves() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, binding) = binding();
        let binding = binding.with_cache(RecordCache::open(dir.path()).await.unwrap());

        let record = record_for("a/b");
        let reply = binding
            .handle_line(&format!("SEND_RECORD:{}", RecordCodec::encode(&record)))
            .await;
        assert_eq!(reply.to_line(), "SUCCESS: Record saved as patient/a/b");
        assert!(coordinator.get_record("a/b").is_ok());
    }
}
