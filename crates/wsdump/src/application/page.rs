//! Bootstrap page served to plain (non-upgrade) requests.
//!
//! The page carries a small script that opens a WebSocket to `/ws` on the
//! same host and port the browser used, sends a greeting, and alerts on the
//! echoed message and on close.  It lets a developer poke the server from a
//! browser with no other tooling.

/// Greeting the page's script sends once the socket opens.
pub const GREETING: &str = "Hello, world!";

/// Renders the page for a browser that reached us at `authority`
/// (`host[:port]`).
///
/// Characters that cannot appear in a host or port are dropped so a crafted
/// `Host` header cannot break out of the script's string literal.
pub fn render_bootstrap_page(authority: &str) -> String {
    let authority: String = authority
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']' | '_' | '%'))
        .collect();

    format!(
        r#"<html><head><title>WebSocketServer</title><script type="text/javascript">
function WebSocketTest()
{{
  if ("WebSocket" in window)
  {{
    var ws = new WebSocket("ws://{authority}/ws");
    ws.onopen = function()
      {{
        ws.send("{GREETING}");
      }};
    ws.onmessage = function(evt)
      {{
        var msg = evt.data;
        alert("Message received: " + msg);
        ws.close();
      }};
    ws.onclose = function()
      {{
        alert("WebSocket closed.");
      }};
  }}
  else
  {{
     alert("This browser does not support WebSockets.");
  }}
}}
</script></head><body>
  <h1>WebSocket Server</h1>
  <p><a href="javascript:WebSocketTest()">Run WebSocket Script</a></p>
</body></html>
"#
    )
}
