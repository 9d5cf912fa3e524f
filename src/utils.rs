// src/utils.rs
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use log::debug;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug)]
pub enum RequestError {
    MissingPeerIP,
    RateLimitExceeded,
    InvalidAddress(String),
    InvalidSnapshot(String),
    ServerNotFound(SocketAddr),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPeerIP => write!(f, "Failed to extract client IP"),
            Self::RateLimitExceeded => write!(f, "Rate limit exceeded"),
            Self::InvalidAddress(addr) => write!(f, "Invalid server address: {}", addr),
            Self::InvalidSnapshot(reason) => write!(f, "Invalid snapshot: {}", reason),
            Self::ServerNotFound(addr) => write!(f, "Server not found: {}", addr),
        }
    }
}

impl ResponseError for RequestError {
    fn error_response(&self) -> HttpResponse {
        match self {
            Self::RateLimitExceeded => HttpResponse::TooManyRequests().body(self.to_string()),
            Self::ServerNotFound(_) => HttpResponse::NotFound().body(self.to_string()),
            _ => HttpResponse::BadRequest().body(self.to_string()),
        }
    }
}

/// Client IP, preferring the first `X-Forwarded-For` entry over the peer.
pub fn extract_real_ip(req: &HttpRequest) -> Result<IpAddr, RequestError> {
    if let Some(forwarded_for) = req.headers().get("X-Forwarded-For") {
        if let Ok(ip_str) = forwarded_for.to_str() {
            if let Some(first_ip) = ip_str.split(',').next() {
                if let Ok(ip) = first_ip.trim().parse::<IpAddr>() {
                    debug!("Using X-Forwarded-For: {}", ip);
                    return Ok(ip);
                }
            }
        }
    }

    req.peer_addr()
        .map(|addr| addr.ip())
        .ok_or(RequestError::MissingPeerIP)
}

pub fn parse_address(addr: &str) -> Result<SocketAddr, RequestError> {
    addr.trim()
        .parse()
        .map_err(|_| RequestError::InvalidAddress(addr.to_string()))
}

pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn forwarded_header_wins() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "203.0.113.7, 10.0.0.1"))
            .peer_addr("127.0.0.1:5000".parse().unwrap())
            .to_http_request();
        assert_eq!(extract_real_ip(&req).unwrap(), "203.0.113.7".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn falls_back_to_peer() {
        let req = TestRequest::default()
            .peer_addr("127.0.0.1:5000".parse().unwrap())
            .to_http_request();
        assert_eq!(extract_real_ip(&req).unwrap(), "127.0.0.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn parse_address_rejects_garbage() {
        assert!(parse_address(" 10.0.0.1:27960 ").is_ok());
        assert!(matches!(parse_address("nope"), Err(RequestError::InvalidAddress(_))));
    }
}
