//! PostgreSQL v3 frontend/backend message catalog.
//!
//! Encoding is pure and synchronous: it turns a [`FrontendMessage`] into bytes
//! appended to a caller-supplied buffer. Decoding works on a payload slice
//! already framed by the connection (see `driver::connection::read_message`)
//! and never touches the network itself.

use bytes::{BufMut, BytesMut};

/// Protocol version 3.0, as a 32-bit big-endian integer (`0x00030000`).
pub const PROTOCOL_VERSION: i32 = 196_608;

/// Frontend (client -> server) messages.
#[derive(Debug, Clone)]
pub enum FrontendMessage<'a> {
    Startup {
        user: &'a str,
        database: &'a str,
        params: &'a [(&'a str, &'a str)],
    },
    Password(&'a [u8]),
    SaslInitialResponse {
        mechanism: &'a str,
        data: &'a [u8],
    },
    SaslResponse(&'a [u8]),
    Query(&'a str),
    Parse {
        name: &'a str,
        sql: &'a str,
        param_types: &'a [u32],
    },
    Bind {
        portal: &'a str,
        statement: &'a str,
        param_formats: &'a [i16],
        params: &'a [Option<Vec<u8>>],
        result_formats: &'a [i16],
    },
    DescribeStatement(&'a str),
    DescribePortal(&'a str),
    Execute {
        portal: &'a str,
        max_rows: i32,
    },
    Sync,
    Flush,
    Terminate,
    CopyData(&'a [u8]),
    CopyDone,
    CopyFail(&'a str),
}

impl<'a> FrontendMessage<'a> {
    /// Append the wire-exact encoding of this message to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            FrontendMessage::Startup {
                user,
                database,
                params,
            } => {
                let mut content = Vec::new();
                content.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
                content.extend_from_slice(b"user\0");
                content.extend_from_slice(user.as_bytes());
                content.push(0);
                content.extend_from_slice(b"database\0");
                content.extend_from_slice(database.as_bytes());
                content.push(0);
                for (k, v) in *params {
                    content.extend_from_slice(k.as_bytes());
                    content.push(0);
                    content.extend_from_slice(v.as_bytes());
                    content.push(0);
                }
                content.push(0);
                buf.put_i32((content.len() + 4) as i32);
                buf.extend_from_slice(&content);
            }
            FrontendMessage::Password(pw) => {
                buf.put_u8(b'p');
                buf.put_i32((pw.len() + 1 + 4) as i32);
                buf.extend_from_slice(pw);
                buf.put_u8(0);
            }
            FrontendMessage::SaslInitialResponse { mechanism, data } => {
                buf.put_u8(b'p');
                let len = 4 + mechanism.len() + 1 + 4 + data.len();
                buf.put_i32(len as i32);
                buf.extend_from_slice(mechanism.as_bytes());
                buf.put_u8(0);
                buf.put_i32(data.len() as i32);
                buf.extend_from_slice(data);
            }
            FrontendMessage::SaslResponse(data) => {
                buf.put_u8(b'p');
                buf.put_i32((data.len() + 4) as i32);
                buf.extend_from_slice(data);
            }
            FrontendMessage::Query(sql) => {
                buf.put_u8(b'Q');
                buf.put_i32((sql.len() + 1 + 4) as i32);
                buf.extend_from_slice(sql.as_bytes());
                buf.put_u8(0);
            }
            FrontendMessage::Parse {
                name,
                sql,
                param_types,
            } => {
                buf.put_u8(b'P');
                let len = 4 + name.len() + 1 + sql.len() + 1 + 2 + 4 * param_types.len();
                buf.put_i32(len as i32);
                buf.extend_from_slice(name.as_bytes());
                buf.put_u8(0);
                buf.extend_from_slice(sql.as_bytes());
                buf.put_u8(0);
                buf.put_i16(param_types.len() as i16);
                for oid in *param_types {
                    buf.put_u32(*oid);
                }
            }
            FrontendMessage::Bind {
                portal,
                statement,
                param_formats,
                params,
                result_formats,
            } => {
                buf.put_u8(b'B');
                let params_size: usize = params
                    .iter()
                    .map(|p| 4 + p.as_ref().map_or(0, |v| v.len()))
                    .sum();
                let len = 4
                    + portal.len()
                    + 1
                    + statement.len()
                    + 1
                    + 2
                    + 2 * param_formats.len()
                    + 2
                    + params_size
                    + 2
                    + 2 * result_formats.len();
                buf.put_i32(len as i32);
                buf.extend_from_slice(portal.as_bytes());
                buf.put_u8(0);
                buf.extend_from_slice(statement.as_bytes());
                buf.put_u8(0);
                buf.put_i16(param_formats.len() as i16);
                for f in *param_formats {
                    buf.put_i16(*f);
                }
                buf.put_i16(params.len() as i16);
                for p in *params {
                    match p {
                        None => buf.put_i32(-1),
                        Some(v) => {
                            buf.put_i32(v.len() as i32);
                            buf.extend_from_slice(v);
                        }
                    }
                }
                buf.put_i16(result_formats.len() as i16);
                for f in *result_formats {
                    buf.put_i16(*f);
                }
            }
            FrontendMessage::DescribeStatement(name) => {
                buf.put_u8(b'D');
                buf.put_i32((1 + name.len() + 1 + 4) as i32);
                buf.put_u8(b'S');
                buf.extend_from_slice(name.as_bytes());
                buf.put_u8(0);
            }
            FrontendMessage::DescribePortal(name) => {
                buf.put_u8(b'D');
                buf.put_i32((1 + name.len() + 1 + 4) as i32);
                buf.put_u8(b'P');
                buf.extend_from_slice(name.as_bytes());
                buf.put_u8(0);
            }
            FrontendMessage::Execute { portal, max_rows } => {
                buf.put_u8(b'E');
                buf.put_i32((portal.len() + 1 + 4 + 4) as i32);
                buf.extend_from_slice(portal.as_bytes());
                buf.put_u8(0);
                buf.put_i32(*max_rows);
            }
            FrontendMessage::Sync => buf.extend_from_slice(&[b'S', 0, 0, 0, 4]),
            FrontendMessage::Flush => buf.extend_from_slice(&[b'H', 0, 0, 0, 4]),
            FrontendMessage::Terminate => buf.extend_from_slice(&[b'X', 0, 0, 0, 4]),
            FrontendMessage::CopyData(data) => {
                buf.put_u8(b'd');
                buf.put_i32((data.len() + 4) as i32);
                buf.extend_from_slice(data);
            }
            FrontendMessage::CopyDone => buf.extend_from_slice(&[b'c', 0, 0, 0, 4]),
            FrontendMessage::CopyFail(reason) => {
                buf.put_u8(b'f');
                buf.put_i32((reason.len() + 1 + 4) as i32);
                buf.extend_from_slice(reason.as_bytes());
                buf.put_u8(0);
            }
        }
    }
}

/// Transaction status byte carried by `ReadyForQuery`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Idle,
    InTransaction,
    Failed,
}

/// One column's metadata from a `RowDescription`.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub table_oid: u32,
    pub column_index: i16,
    pub type_oid: u32,
    pub type_len: i16,
    pub type_modifier: i32,
    pub format_code: i16,
}

/// The recognized fields of an `ErrorResponse`/`NoticeResponse`.
#[derive(Debug, Clone, Default)]
pub struct ErrorInfo {
    pub severity: String,
    pub code: String,
    pub message: String,
    pub detail: Option<String>,
    pub hint: Option<String>,
    pub position: Option<String>,
    pub schema: Option<String>,
    pub table: Option<String>,
    pub column: Option<String>,
}

/// Backend (server -> client) messages, decoded from an already-framed payload.
#[derive(Debug, Clone)]
pub enum BackendMessage {
    AuthenticationOk,
    AuthenticationCleartextPassword,
    AuthenticationMd5Password { salt: [u8; 4] },
    AuthenticationSasl { mechanisms: Vec<String> },
    AuthenticationSaslContinue(Vec<u8>),
    AuthenticationSaslFinal(Vec<u8>),
    ParameterStatus { name: String, value: String },
    BackendKeyData { process_id: u32, secret_key: u32 },
    ReadyForQuery(TransactionStatus),
    RowDescription(Vec<FieldDescriptor>),
    DataRow(Vec<Option<Vec<u8>>>),
    CommandComplete(String),
    ErrorResponse(ErrorInfo),
    NoticeResponse(ErrorInfo),
    ParseComplete,
    BindComplete,
    CloseComplete,
    NoData,
    EmptyQueryResponse,
    PortalSuspended,
    ParameterDescription(Vec<u32>),
    NotificationResponse {
        process_id: u32,
        channel: String,
        payload: String,
    },
    CopyInResponse {
        overall_format: u8,
        column_formats: Vec<i16>,
    },
    CopyOutResponse {
        overall_format: u8,
        column_formats: Vec<i16>,
    },
    CopyData(Vec<u8>),
    CopyDone,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("truncated {what} payload")]
    Truncated { what: &'static str },
    #[error("missing NUL terminator in {what}")]
    MissingTerminator { what: &'static str },
    #[error("invalid UTF-8 in {what}")]
    InvalidUtf8 { what: &'static str },
    #[error("unknown backend message type {0:?}")]
    UnknownMessageType(u8),
    #[error("unknown authentication sub-code {0}")]
    UnknownAuthCode(i32),
    #[error("unknown transaction status byte {0:?}")]
    UnknownTransactionStatus(u8),
}

fn read_cstr<'a>(buf: &'a [u8], pos: &mut usize, what: &'static str) -> Result<&'a str, DecodeError> {
    let start = *pos;
    let end = buf[start..]
        .iter()
        .position(|&b| b == 0)
        .ok_or(DecodeError::MissingTerminator { what })?
        + start;
    let s = std::str::from_utf8(&buf[start..end]).map_err(|_| DecodeError::InvalidUtf8 { what })?;
    *pos = end + 1;
    Ok(s)
}

impl BackendMessage {
    /// Decode one message given its type tag and already-framed payload
    /// (the bytes after the 4-byte length field).
    pub fn decode(tag: u8, payload: &[u8]) -> Result<Self, DecodeError> {
        match tag {
            b'R' => Self::decode_auth(payload),
            b'S' => Self::decode_parameter_status(payload),
            b'K' => Self::decode_backend_key_data(payload),
            b'Z' => Self::decode_ready_for_query(payload),
            b'T' => Self::decode_row_description(payload),
            b'D' => Self::decode_data_row(payload),
            b'C' => Ok(BackendMessage::CommandComplete(
                String::from_utf8_lossy(payload.strip_suffix(&[0]).unwrap_or(payload)).into_owned(),
            )),
            b'E' => Ok(BackendMessage::ErrorResponse(Self::decode_error_fields(payload)?)),
            b'N' => Ok(BackendMessage::NoticeResponse(Self::decode_error_fields(payload)?)),
            b'1' => Ok(BackendMessage::ParseComplete),
            b'2' => Ok(BackendMessage::BindComplete),
            b'3' => Ok(BackendMessage::CloseComplete),
            b'n' => Ok(BackendMessage::NoData),
            b'I' => Ok(BackendMessage::EmptyQueryResponse),
            b's' => Ok(BackendMessage::PortalSuspended),
            b't' => Self::decode_parameter_description(payload),
            b'A' => Self::decode_notification_response(payload),
            b'G' => Self::decode_copy_response(payload, true),
            b'H' => Self::decode_copy_response(payload, false),
            b'd' => Ok(BackendMessage::CopyData(payload.to_vec())),
            b'c' => Ok(BackendMessage::CopyDone),
            other => Err(DecodeError::UnknownMessageType(other)),
        }
    }

    fn decode_auth(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < 4 {
            return Err(DecodeError::Truncated { what: "Authentication" });
        }
        let code = i32::from_be_bytes(payload[0..4].try_into().unwrap());
        match code {
            0 => Ok(BackendMessage::AuthenticationOk),
            3 => Ok(BackendMessage::AuthenticationCleartextPassword),
            5 => {
                if payload.len() < 8 {
                    return Err(DecodeError::Truncated { what: "AuthenticationMD5Password" });
                }
                let mut salt = [0u8; 4];
                salt.copy_from_slice(&payload[4..8]);
                Ok(BackendMessage::AuthenticationMd5Password { salt })
            }
            10 => {
                let mut mechanisms = Vec::new();
                let mut pos = 4;
                while pos < payload.len() && payload[pos] != 0 {
                    let s = read_cstr(payload, &mut pos, "SASL mechanism")?;
                    mechanisms.push(s.to_string());
                }
                Ok(BackendMessage::AuthenticationSasl { mechanisms })
            }
            11 => Ok(BackendMessage::AuthenticationSaslContinue(payload[4..].to_vec())),
            12 => Ok(BackendMessage::AuthenticationSaslFinal(payload[4..].to_vec())),
            other => Err(DecodeError::UnknownAuthCode(other)),
        }
    }

    fn decode_parameter_status(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut pos = 0;
        let name = read_cstr(payload, &mut pos, "ParameterStatus.name")?.to_string();
        let value = read_cstr(payload, &mut pos, "ParameterStatus.value")?.to_string();
        Ok(BackendMessage::ParameterStatus { name, value })
    }

    fn decode_backend_key_data(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < 8 {
            return Err(DecodeError::Truncated { what: "BackendKeyData" });
        }
        Ok(BackendMessage::BackendKeyData {
            process_id: u32::from_be_bytes(payload[0..4].try_into().unwrap()),
            secret_key: u32::from_be_bytes(payload[4..8].try_into().unwrap()),
        })
    }

    fn decode_ready_for_query(payload: &[u8]) -> Result<Self, DecodeError> {
        let status = match payload.first() {
            Some(b'I') => TransactionStatus::Idle,
            Some(b'T') => TransactionStatus::InTransaction,
            Some(b'E') => TransactionStatus::Failed,
            Some(&other) => return Err(DecodeError::UnknownTransactionStatus(other)),
            None => return Err(DecodeError::Truncated { what: "ReadyForQuery" }),
        };
        Ok(BackendMessage::ReadyForQuery(status))
    }

    fn decode_row_description(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < 2 {
            return Err(DecodeError::Truncated { what: "RowDescription" });
        }
        let count = i16::from_be_bytes(payload[0..2].try_into().unwrap()) as usize;
        let mut pos = 2;
        let mut fields = Vec::with_capacity(count);
        for _ in 0..count {
            let name = read_cstr(payload, &mut pos, "RowDescription.name")?.to_string();
            if pos + 18 > payload.len() {
                return Err(DecodeError::Truncated { what: "RowDescription field" });
            }
            let table_oid = u32::from_be_bytes(payload[pos..pos + 4].try_into().unwrap());
            let column_index = i16::from_be_bytes(payload[pos + 4..pos + 6].try_into().unwrap());
            let type_oid = u32::from_be_bytes(payload[pos + 6..pos + 10].try_into().unwrap());
            let type_len = i16::from_be_bytes(payload[pos + 10..pos + 12].try_into().unwrap());
            let type_modifier = i32::from_be_bytes(payload[pos + 12..pos + 16].try_into().unwrap());
            let format_code = i16::from_be_bytes(payload[pos + 16..pos + 18].try_into().unwrap());
            pos += 18;
            fields.push(FieldDescriptor {
                name,
                table_oid,
                column_index,
                type_oid,
                type_len,
                type_modifier,
                format_code,
            });
        }
        Ok(BackendMessage::RowDescription(fields))
    }

    fn decode_data_row(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < 2 {
            return Err(DecodeError::Truncated { what: "DataRow" });
        }
        let count = i16::from_be_bytes(payload[0..2].try_into().unwrap()) as usize;
        let mut pos = 2;
        let mut columns = Vec::with_capacity(count);
        for _ in 0..count {
            if pos + 4 > payload.len() {
                return Err(DecodeError::Truncated { what: "DataRow column length" });
            }
            let len = i32::from_be_bytes(payload[pos..pos + 4].try_into().unwrap());
            pos += 4;
            if len < 0 {
                columns.push(None);
                continue;
            }
            let len = len as usize;
            if pos + len > payload.len() {
                return Err(DecodeError::Truncated { what: "DataRow column data" });
            }
            columns.push(Some(payload[pos..pos + len].to_vec()));
            pos += len;
        }
        Ok(BackendMessage::DataRow(columns))
    }

    fn decode_error_fields(payload: &[u8]) -> Result<ErrorInfo, DecodeError> {
        let mut info = ErrorInfo::default();
        let mut pos = 0;
        while pos < payload.len() && payload[pos] != 0 {
            let field_code = payload[pos];
            pos += 1;
            let value = read_cstr(payload, &mut pos, "ErrorResponse field")?.to_string();
            match field_code {
                b'S' => info.severity = value,
                b'C' => info.code = value,
                b'M' => info.message = value,
                b'D' => info.detail = Some(value),
                b'H' => info.hint = Some(value),
                b'P' => info.position = Some(value),
                b's' => info.schema = Some(value),
                b't' => info.table = Some(value),
                b'c' => info.column = Some(value),
                _ => {}
            }
        }
        Ok(info)
    }

    fn decode_parameter_description(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < 2 {
            return Err(DecodeError::Truncated { what: "ParameterDescription" });
        }
        let count = i16::from_be_bytes(payload[0..2].try_into().unwrap()) as usize;
        let mut oids = Vec::with_capacity(count);
        let mut pos = 2;
        for _ in 0..count {
            if pos + 4 > payload.len() {
                return Err(DecodeError::Truncated { what: "ParameterDescription oid" });
            }
            oids.push(u32::from_be_bytes(payload[pos..pos + 4].try_into().unwrap()));
            pos += 4;
        }
        Ok(BackendMessage::ParameterDescription(oids))
    }

    fn decode_notification_response(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < 4 {
            return Err(DecodeError::Truncated { what: "NotificationResponse" });
        }
        let process_id = u32::from_be_bytes(payload[0..4].try_into().unwrap());
        let mut pos = 4;
        let channel = read_cstr(payload, &mut pos, "NotificationResponse.channel")?.to_string();
        let payload_str = read_cstr(payload, &mut pos, "NotificationResponse.payload")?.to_string();
        Ok(BackendMessage::NotificationResponse {
            process_id,
            channel,
            payload: payload_str,
        })
    }

    fn decode_copy_response(payload: &[u8], is_in: bool) -> Result<Self, DecodeError> {
        if payload.len() < 3 {
            return Err(DecodeError::Truncated { what: "CopyResponse" });
        }
        let overall_format = payload[0];
        let count = i16::from_be_bytes(payload[1..3].try_into().unwrap()) as usize;
        let mut formats = Vec::with_capacity(count);
        let mut pos = 3;
        for _ in 0..count {
            if pos + 2 > payload.len() {
                return Err(DecodeError::Truncated { what: "CopyResponse column format" });
            }
            formats.push(i16::from_be_bytes(payload[pos..pos + 2].try_into().unwrap()));
            pos += 2;
        }
        if is_in {
            Ok(BackendMessage::CopyInResponse {
                overall_format,
                column_formats: formats,
            })
        } else {
            Ok(BackendMessage::CopyOutResponse {
                overall_format,
                column_formats: formats,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_framing() {
        let mut buf = BytesMut::new();
        FrontendMessage::Startup {
            user: "postgres",
            database: "mydb",
            params: &[],
        }
        .encode(&mut buf);
        let len = i32::from_be_bytes(buf[0..4].try_into().unwrap());
        assert_eq!(len as usize, buf.len());
        assert_eq!(&buf[4..8], &PROTOCOL_VERSION.to_be_bytes());
        assert!(buf.ends_with(b"user\0postgres\0database\0mydb\0\0"));
    }

    #[test]
    fn query_message_roundtrips_tag_and_length() {
        let mut buf = BytesMut::new();
        FrontendMessage::Query("SELECT 1").encode(&mut buf);
        assert_eq!(buf[0], b'Q');
        let len = i32::from_be_bytes(buf[1..5].try_into().unwrap());
        assert_eq!(len as usize, buf.len() - 1);
    }

    #[test]
    fn decode_ready_for_query_status() {
        let msg = BackendMessage::decode(b'Z', b"T").unwrap();
        assert!(matches!(msg, BackendMessage::ReadyForQuery(TransactionStatus::InTransaction)));
    }

    #[test]
    fn decode_row_description_and_data_row() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1i16.to_be_bytes());
        payload.extend_from_slice(b"id\0");
        payload.extend_from_slice(&0u32.to_be_bytes());
        payload.extend_from_slice(&0i16.to_be_bytes());
        payload.extend_from_slice(&23u32.to_be_bytes()); // int4
        payload.extend_from_slice(&4i16.to_be_bytes());
        payload.extend_from_slice(&(-1i32).to_be_bytes());
        payload.extend_from_slice(&0i16.to_be_bytes());
        let msg = BackendMessage::decode(b'T', &payload).unwrap();
        match msg {
            BackendMessage::RowDescription(fields) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].name, "id");
                assert_eq!(fields[0].type_oid, 23);
            }
            _ => panic!("wrong variant"),
        }

        let mut row_payload = Vec::new();
        row_payload.extend_from_slice(&1i16.to_be_bytes());
        row_payload.extend_from_slice(&4i32.to_be_bytes());
        row_payload.extend_from_slice(b"1234");
        let row = BackendMessage::decode(b'D', &row_payload).unwrap();
        match row {
            BackendMessage::DataRow(cols) => {
                assert_eq!(cols, vec![Some(b"1234".to_vec())]);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_null_column() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1i16.to_be_bytes());
        payload.extend_from_slice(&(-1i32).to_be_bytes());
        let row = BackendMessage::decode(b'D', &payload).unwrap();
        assert!(matches!(row, BackendMessage::DataRow(cols) if cols == vec![None]));
    }

    #[test]
    fn command_complete_tag() {
        let msg = BackendMessage::decode(b'C', b"INSERT 0 3\0").unwrap();
        match msg {
            BackendMessage::CommandComplete(tag) => assert_eq!(tag, "INSERT 0 3"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn error_response_fields() {
        let mut payload = Vec::new();
        payload.push(b'S');
        payload.extend_from_slice(b"ERROR\0");
        payload.push(b'C');
        payload.extend_from_slice(b"42601\0");
        payload.push(b'M');
        payload.extend_from_slice(b"syntax error\0");
        payload.push(0);
        let msg = BackendMessage::decode(b'E', &payload).unwrap();
        match msg {
            BackendMessage::ErrorResponse(info) => {
                assert_eq!(info.severity, "ERROR");
                assert_eq!(info.code, "42601");
                assert_eq!(info.message, "syntax error");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn unknown_message_type_is_an_error() {
        assert!(BackendMessage::decode(b'~', b"").is_err());
    }
}
