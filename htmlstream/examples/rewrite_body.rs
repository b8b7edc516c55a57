//! Rewrite a chunked HTML body with `lol_html` and print what the consumer sees.
//!
//! Run with `cargo run -p htmlstream --example rewrite_body --features lol-html`.

use bytes::Bytes;
use futures::StreamExt;
use futures::executor::block_on;
use htmlstream::adapters::lol_html::LolHtmlEngine;
use htmlstream::{BoxError, RewriteStream};
use lol_html::{Settings, element};

fn main() {
    let engine = LolHtmlEngine::new(|| Settings {
        element_content_handlers: vec![element!("a[href]", |el| {
            el.set_attribute("rel", "noopener")?;
            Ok(())
        })],
        ..Settings::default()
    });

    let chunks = ["<p>see <a hr", "ef=\"/docs\">the d", "ocs</a></p>"];
    let upstream = futures::stream::iter(
        chunks
            .into_iter()
            .map(|c| Ok::<_, BoxError>(Bytes::from_static(c.as_bytes()))),
    );

    let mut stream = match RewriteStream::new(&engine, upstream) {
        Ok(stream) => stream,
        Err(err) => {
            eprintln!("cannot start rewrite: {err}");
            return;
        }
    };

    block_on(async {
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => println!("chunk: {:?}", String::from_utf8_lossy(&chunk)),
                Err(err) => {
                    eprintln!("rewrite failed: {err}");
                    break;
                }
            }
        }
    });
}
