// src/devnet/protocol.rs

//! Wire format of the devnet fixture: one JSON object per line in each
//! direction, one response per request.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    pub balance: String,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub contracts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Ping,
    CreateAccount {
        #[serde(default)]
        keys: Vec<String>,
    },
    GetAccount {
        address: String,
    },
}

impl Request {
    pub fn op(&self) -> &'static str {
        match self {
            Request::Ping => "ping",
            Request::CreateAccount { .. } => "create_account",
            Request::GetAccount { .. } => "get_account",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Pong,
    Account { account: Account },
    Error { message: String },
}

/// Send one request to the devnet at `host` and wait for its response.
pub async fn call(host: &str, request: &Request) -> anyhow::Result<Response> {
    use anyhow::Context;

    let stream = TcpStream::connect(host)
        .await
        .with_context(|| format!("connecting to devnet at {host}"))?;
    let (read_half, mut write_half) = stream.into_split();

    let mut line = serde_json::to_string(request)?;
    line.push('\n');
    write_half.write_all(line.as_bytes()).await?;
    write_half.flush().await?;

    let mut reader = BufReader::new(read_half);
    let mut reply = String::new();
    let n = reader.read_line(&mut reply).await?;
    if n == 0 {
        anyhow::bail!("devnet at {host} closed the connection without a response");
    }

    let response = serde_json::from_str(reply.trim_end())
        .with_context(|| format!("decoding devnet response {:?}", reply.trim_end()))?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shapes() {
        let req: Request = serde_json::from_str(r#"{"op":"get_account","address":"0x01"}"#).unwrap();
        assert_eq!(
            req,
            Request::GetAccount {
                address: "0x01".to_string()
            }
        );

        let req: Request = serde_json::from_str(r#"{"op":"create_account"}"#).unwrap();
        assert_eq!(req, Request::CreateAccount { keys: vec![] });

        let json = serde_json::to_string(&Response::Error {
            message: "nope".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"status":"error","message":"nope"}"#);
    }
}
