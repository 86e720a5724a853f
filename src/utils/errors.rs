/// Extract clean error message from upstream gRPC error strings
///
/// Removes status prefixes like:
/// "rpc error: code = NotFound desc = unable to locate invoice"
///
/// Returns only the meaningful error message:
/// "unable to locate invoice"
pub fn extract_clean_error(error_msg: &str) -> String {
    const DESC_MARKER: &str = " desc = ";

    if error_msg.starts_with("rpc error:") {
        if let Some(idx) = error_msg.find(DESC_MARKER) {
            return error_msg[idx + DESC_MARKER.len()..].trim().to_string();
        }
    }
    error_msg.trim().to_string()
}
