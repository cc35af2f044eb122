use crate::api::flash::FlashMessage;
use crate::models::SeparationResult;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::fmt::Write;

/// Characters left as-is inside a URL path segment
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'_').remove(b'-');

const STYLE: &str = "body{font-family:sans-serif;max-width:40rem;margin:2rem auto;padding:0 1rem}\
.flash{padding:.5rem 1rem;border-radius:4px;margin:.5rem 0}\
.info{background:#e7f1ff}.success{background:#e6f6ea}.error{background:#fde8e8}\
form{margin:1.5rem 0}ul.stems li{margin:.3rem 0}";

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn download_url(track_id: &str, stem: &str) -> String {
    format!(
        "/separated/{}/{}",
        utf8_percent_encode(track_id, SEGMENT),
        utf8_percent_encode(stem, SEGMENT)
    )
}

/// Upload form, pending messages and, after a successful run, the stem links.
pub fn render_index(
    model_name: &str,
    messages: &[FlashMessage],
    result: Option<&SeparationResult>,
) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!doctype html><html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>Vocal Splitter</title><style>{}</style></head><body>\
         <h1>Vocal Splitter</h1><p>Model: <code>{}</code></p>",
        STYLE,
        escape_html(model_name)
    );

    for m in messages {
        let _ = write!(
            html,
            "<div class=\"flash {}\">{}</div>",
            m.category.as_str(),
            escape_html(&m.message)
        );
    }

    html.push_str(
        "<form method=\"post\" action=\"/\" enctype=\"multipart/form-data\">\
         <input type=\"file\" name=\"file\" accept=\".mp3,.wav,.flac,.ogg,.m4a,audio/*\">\
         <button type=\"submit\">Separate</button></form>",
    );

    if let Some(result) = result {
        let _ = write!(
            html,
            "<section id=\"results\"><h2>Stems for {}</h2>\
             <p>Track: <code>{}</code> &middot; model <code>{}</code></p><ul class=\"stems\">",
            escape_html(&result.original_display_name),
            escape_html(result.track_id.as_str()),
            escape_html(&result.model_name)
        );
        for stem in &result.stems {
            let _ = write!(
                html,
                "<li><a href=\"{}\" download>{}</a></li>",
                escape_html(&download_url(result.track_id.as_str(), stem)),
                escape_html(stem)
            );
        }
        html.push_str("</ul></section>");
    }

    html.push_str("</body></html>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrackId;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<script>alert('x') & \"y\"</script>"),
            "&lt;script&gt;alert(&#x27;x&#x27;) &amp; &quot;y&quot;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_download_url_encodes_segments() {
        assert_eq!(download_url("abc_song", "vocals.wav"), "/separated/abc_song/vocals.wav");
        assert_eq!(download_url("a b", "x/y"), "/separated/a%20b/x%2Fy");
    }

    #[test]
    fn test_render_form_only() {
        let html = render_index("htdemucs", &[FlashMessage::error("<bad>")], None);
        assert!(html.contains("enctype=\"multipart/form-data\""));
        assert!(html.contains("name=\"file\""));
        assert!(html.contains("class=\"flash error\">&lt;bad&gt;"));
        assert!(!html.contains("id=\"results\""));
    }

    #[test]
    fn test_render_results() {
        let track_id = TrackId::parse("0123456789abcdef0123456789abcdef_song").unwrap();
        let result = SeparationResult {
            track_id,
            stems: vec!["vocals.wav".to_string()],
            original_display_name: "song.mp3".to_string(),
            model_name: "htdemucs".to_string(),
        };
        let html = render_index("htdemucs", &[], Some(&result));
        assert!(html.contains(
            "href=\"/separated/0123456789abcdef0123456789abcdef_song/vocals.wav\""
        ));
        assert!(html.contains("Stems for song.mp3"));
        assert!(!html.contains("no_vocals.wav"));
    }
}
