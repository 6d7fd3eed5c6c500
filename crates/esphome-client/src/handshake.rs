//! Hello and connect exchange that opens every session.

use esphome_proto::api::{ConnectRequest, ConnectResponse, HelloRequest, HelloResponse};
use esphome_proto::{API_VERSION_MAJOR, API_VERSION_MINOR};
use tracing::debug;

use crate::connection::Shared;
use crate::error::{ApiError, Result};
use crate::model::HelloInfo;
use crate::state::ConnectionState;

/// Drive the connection from `Connecting` to `Ready`.
///
/// On error the caller fails the connection; nothing else is sent.
pub(crate) async fn run(shared: &Shared) -> Result<HelloInfo> {
    shared.advance(ConnectionState::AwaitingHello)?;
    let hello: HelloResponse = shared
        .request(HelloRequest {
            client_info: shared.config.client_info.clone(),
            api_version_major: API_VERSION_MAJOR,
            api_version_minor: API_VERSION_MINOR,
        })
        .await?;

    let hello = HelloInfo::from(hello);
    if hello.api_version.major != API_VERSION_MAJOR {
        return Err(ApiError::UnexpectedMessage(format!(
            "device speaks API {}, client supports {API_VERSION_MAJOR}.x",
            hello.api_version
        )));
    }
    debug!(device = %hello.name, api_version = %hello.api_version, "hello accepted");
    // A connection runs the handshake at most once.
    let _ = shared.hello.set(hello.clone());

    shared.advance(ConnectionState::AwaitingConnectAck)?;
    let ack: ConnectResponse = shared
        .request(ConnectRequest {
            password: shared.config.password.clone(),
        })
        .await?;
    if ack.invalid_password {
        return Err(ApiError::Authentication(
            "device rejected the password".to_string(),
        ));
    }

    shared.advance(ConnectionState::Ready)?;
    Ok(hello)
}
