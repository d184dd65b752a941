// src/devnet/mod.rs

//! `emu-devnet`: a small stand-in for the emulator service.
//!
//! Listens on TCP, prints `Started gRPC server on <addr>` on stdout once it
//! accepts connections, and keeps an in-memory account table. It exists so
//! the supervisor and runner can be exercised end to end; there is no
//! transaction or contract logic.

pub mod protocol;

use std::collections::BTreeMap;
use std::future::Future;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

pub use protocol::{call, Account, Request, Response};

/// Address of the account that exists from startup.
pub const SERVICE_ACCOUNT: &str = "0xf8d6e0586b0a20c7";

/// Prefix of the line printed once the listener is bound.
pub const READY_LINE_PREFIX: &str = "Started gRPC server on";

const SERVICE_BALANCE: &str = "999999999.00000000";
const NEW_ACCOUNT_BALANCE: &str = "0.00100000";

#[derive(Debug, Clone)]
pub struct DevnetOptions {
    pub host: String,
    pub port: u16,
    /// Sleep before binding, to simulate a slow start.
    pub startup_delay: Duration,
}

impl Default for DevnetOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3570,
            startup_delay: Duration::ZERO,
        }
    }
}

/// In-memory account table.
#[derive(Debug)]
pub struct Ledger {
    accounts: BTreeMap<String, Account>,
    next_index: u64,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        let mut accounts = BTreeMap::new();
        accounts.insert(
            SERVICE_ACCOUNT.to_string(),
            Account {
                address: SERVICE_ACCOUNT.to_string(),
                balance: SERVICE_BALANCE.to_string(),
                keys: Vec::new(),
                contracts: Vec::new(),
            },
        );
        Self {
            accounts,
            next_index: 1,
        }
    }

    pub fn create_account(&mut self, keys: Vec<String>) -> Account {
        let address = loop {
            let candidate = account_address(self.next_index);
            self.next_index += 1;
            if !self.accounts.contains_key(&candidate) {
                break candidate;
            }
        };

        let account = Account {
            address: address.clone(),
            balance: NEW_ACCOUNT_BALANCE.to_string(),
            keys,
            contracts: Vec::new(),
        };
        self.accounts.insert(address, account.clone());
        account
    }

    pub fn get_account(&self, address: &str) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub fn handle(&mut self, request: Request) -> Response {
        match request {
            Request::Ping => Response::Pong,
            Request::CreateAccount { keys } => Response::Account {
                account: self.create_account(keys),
            },
            Request::GetAccount { address } => match self.get_account(&address) {
                Some(account) => Response::Account {
                    account: account.clone(),
                },
                None => Response::Error {
                    message: format!("account {address} not found"),
                },
            },
        }
    }
}

/// Deterministic 8-byte address for the `index`-th created account.
fn account_address(index: u64) -> String {
    let mixed = index
        .wrapping_mul(0x9e37_79b9_7f4a_7c15)
        .rotate_left(17)
        ^ 0x01cf_0e2f_2f71_5450;
    format!("0x{mixed:016x}")
}

/// Bind, announce readiness on stdout and serve until `shutdown` resolves.
pub async fn serve<F>(opts: DevnetOptions, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    if !opts.startup_delay.is_zero() {
        debug!(delay_ms = opts.startup_delay.as_millis() as u64, "delaying startup");
        tokio::time::sleep(opts.startup_delay).await;
    }

    let bind_addr = format!("{}:{}", opts.host, opts.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding devnet listener on {bind_addr}"))?;
    let local = listener.local_addr()?;

    announce(&format!("{READY_LINE_PREFIX} {local}"))?;
    info!(address = %local, "devnet listening");

    let ledger = Arc::new(Mutex::new(Ledger::new()));

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("devnet shutting down");
                announce("Shutting down")?;
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let ledger = Arc::clone(&ledger);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, peer, ledger).await {
                                warn!(%peer, error = %e, "connection failed");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                }
            }
        }
    }

    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    ledger: Arc<Mutex<Ledger>>,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                announce(&format!("request op={} from {peer}", request.op()))?;
                let mut guard = ledger.lock().unwrap_or_else(PoisonError::into_inner);
                guard.handle(request)
            }
            Err(e) => Response::Error {
                message: format!("malformed request: {e}"),
            },
        };

        let mut out = serde_json::to_string(&response)?;
        out.push('\n');
        write_half.write_all(out.as_bytes()).await?;
    }

    Ok(())
}

/// Stdout is what the harness scans, so every line is flushed immediately.
fn announce(line: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_creates_distinct_retrievable_accounts() {
        let mut ledger = Ledger::new();
        let a = ledger.create_account(vec!["k1".to_string()]);
        let b = ledger.create_account(Vec::new());

        assert_ne!(a.address, b.address);
        assert_ne!(a.address, SERVICE_ACCOUNT);
        assert_eq!(ledger.get_account(&a.address), Some(&a));
        assert!(crate::extract::is_well_formed_address(&a.address));
    }

    #[test]
    fn unknown_account_is_an_error_response() {
        let mut ledger = Ledger::new();
        let response = ledger.handle(Request::GetAccount {
            address: "0x00".to_string(),
        });
        assert!(matches!(response, Response::Error { .. }));
    }

    #[tokio::test]
    async fn serves_requests_until_shutdown() {
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        // The ready line goes to stdout, so pick the port up front.
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let opts = DevnetOptions {
            port,
            ..DevnetOptions::default()
        };
        let server = tokio::spawn(serve(opts, async move {
            let _ = stop_rx.await;
        }));

        let host = format!("127.0.0.1:{port}");
        let mut pong = None;
        for _ in 0..100 {
            if let Ok(r) = call(&host, &Request::Ping).await {
                pong = Some(r);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(pong, Some(Response::Pong));

        let created = call(&host, &Request::CreateAccount { keys: vec![] }).await.unwrap();
        let Response::Account { account } = created else {
            panic!("expected account, got {created:?}");
        };
        let fetched = call(
            &host,
            &Request::GetAccount {
                address: account.address.clone(),
            },
        )
        .await
        .unwrap();
        assert_eq!(fetched, Response::Account { account });

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
