use std::collections::HashMap;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

pub static LOGO_PNG: &[u8] = &[
    137, 80, 78, 71, 13, 10, 26, 10, 0, 0, 0, 13, 73, 72, 68, 82, 0, 0, 0, 1, 0, 0, 0, 1, 8, 4, 0,
    0, 0, 181, 28, 12, 2, 0, 0, 0, 11, 73, 68, 65, 84, 120, 218, 99, 252, 255, 23, 0, 2, 3, 1, 128,
    110, 220, 25, 0, 0, 0, 0, 73, 69, 78, 68, 174, 66, 96, 130,
];

type Routes = Arc<Mutex<HashMap<String, (&'static str, Vec<u8>)>>>;

/// Serves fixed bodies by path; everything else is a 404.
pub struct SiteStub {
    pub base_url: String,
    routes: Routes,
    requests: Arc<Mutex<Vec<String>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

pub fn book_info_page(book_id: &str, name: &str, first_chapter_id: &str) -> String {
    format!(
        r#"<!doctype html>
<html><head><script>
var g_data = {{}};
g_data.book = {{"bookInfo":{{"bookId":"{book_id}","bookName":"{name}","authorName":"Ann \'A\' Lee","chapterNum":2,"description":"First line\r\n\r\nsecond\\line","firstChapterId":"{first_chapter_id}","cover":"https://elsewhere.example/x.jpg"}}}},
g_data.tag = {{"x":1}};
</script></head><body><h1>{name}</h1></body></html>
"#
    )
}

pub fn text_chapter_page(id: &str, index: u32, next: &str, is_auth: u8) -> String {
    format!(
        r#"<!doctype html>
<html><head><script>var chapInfo = {{"chapterInfo":{{"chapterId":"{id}","chapterName":"Chapter {index}: Start","chapterIndex":{index},"preChapterId":"-1","nextChapterId":"{next}","isAuth":{is_auth},"contents":[{{"contentId":"{id}-1","content":"It was a \'dark\' night &amp; cold.","likeNums":2}},{{"contentId":"{id}-2","content":"<p>Then morning came.</p>"}}]}}}};
var other = 1;</script></head><body></body></html>
"#
    )
}

pub fn comic_info_page(comic_id: &str, name: &str, first_chapter_id: &str) -> String {
    format!(
        r#"<html><head><script>g_data.book = {{"comicInfo":{{"comicId":"{comic_id}","comicName":"{name}","authorName":"Bo","publisher":"Pub","totalChapterNum":1,"firstChapterId":"{first_chapter_id}"}}}};</script></head></html>"#
    )
}

pub fn image_chapter_page(id: &str, next: &str, page_urls: &[String]) -> String {
    let pages = page_urls
        .iter()
        .enumerate()
        .map(|(idx, url)| format!(r#"{{"pageId":"{id}-{idx}","url":"{url}","width":1,"height":1}}"#))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        r#"<html><head><script>var chapInfo = {{"chapterInfo":{{"chapterId":"{id}","chapterName":"Episode {id}","chapterIndex":1,"nextChapterId":"{next}","isAuth":1,"chapterPage":[{pages}]}}}};</script></head></html>"#
    )
}

impl SiteStub {
    pub fn spawn() -> Self {
        let routes: Routes = Arc::default();
        let server_routes = Arc::clone(&routes);
        let requests: Arc<Mutex<Vec<String>>> = Arc::default();
        let server_requests = Arc::clone(&requests);
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start site stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let url = request.url().to_string();
                let path = url.split('?').next().unwrap_or(&url).to_owned();
                server_requests
                    .lock()
                    .expect("lock requests")
                    .push(path.clone());

                let route = server_routes
                    .lock()
                    .expect("lock routes")
                    .get(&path)
                    .cloned();
                let Some((content_type, body)) = route else {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                };

                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes())
                        .expect("build header");
                let response = tiny_http::Response::from_data(body)
                    .with_status_code(200)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            routes,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Paths requested so far, in arrival order.
    pub fn requested_paths(&self) -> Vec<String> {
        self.requests.lock().expect("lock requests").clone()
    }

    pub fn route(&self, path: &str, response: (&'static str, Vec<u8>)) {
        self.routes
            .lock()
            .expect("lock routes")
            .insert(path.to_owned(), response);
    }
}

impl Drop for SiteStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn html(body: String) -> (&'static str, Vec<u8>) {
    ("text/html; charset=utf-8", body.into_bytes())
}

pub fn png() -> (&'static str, Vec<u8>) {
    ("image/png", LOGO_PNG.to_vec())
}
