use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::{Rgba, RgbaImage};
use quilt_viewer::events::{InvalidQuilt, LoadQuilt, QuiltLoaded, ViewerCommand};
use quilt_viewer::quilt::TileGrid;
use quilt_viewer::tasks::loader::{self, LoaderOptions};
use quilt_viewer::tasks::playlist::{self, Playlist};
use quilt_viewer::tasks::files;
use tempfile::tempdir;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(10);

/// Small quilt whose `tiles_x x tiles_y` tiles repeat one gradient view.
fn write_quilt(path: &Path, width: u32, height: u32, tiles_x: u32, tiles_y: u32) {
    let tile_w = width / tiles_x;
    let tile_h = height / tiles_y;
    let img = RgbaImage::from_fn(width, height, |x, y| {
        let u = x % tile_w;
        let v = y % tile_h;
        Rgba([(u * 7 % 256) as u8, (v * 13 % 256) as u8, ((u * v) % 251) as u8, 255])
    });
    img.save(path).unwrap();
}

#[test]
fn discovery_walks_directories_in_order() {
    let tmp = tempdir().unwrap();
    let lib = tmp.path().join("lib");
    fs::create_dir_all(lib.join("nested")).unwrap();
    fs::write(lib.join("b.png"), b"x").unwrap();
    fs::write(lib.join("a.JPG"), b"x").unwrap();
    fs::write(lib.join("notes.txt"), b"x").unwrap();
    fs::write(lib.join("nested").join("c.jpeg"), b"x").unwrap();
    let single = tmp.path().join("single.png");
    fs::write(&single, b"x").unwrap();

    let found = files::discover_quilts(&[single.clone(), lib.clone(), single.clone()]).unwrap();
    let names: Vec<String> = found
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["single.png", "a.JPG", "b.png", "c.jpeg"]);
    assert!(files::discover_quilts(&[tmp.path().join("missing")]).is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn playlist_requests_first_and_wraps() {
    let (cmd_tx, cmd_rx) = mpsc::channel(4);
    let (load_tx, mut load_rx) = mpsc::channel(4);
    let cancel = CancellationToken::new();
    let list = Playlist::new(vec![PathBuf::from("a.png"), PathBuf::from("b.png")]);
    let handle = tokio::spawn(playlist::run(list, cmd_rx, load_tx, cancel.clone()));

    let LoadQuilt(first) = timeout(WAIT, load_rx.recv()).await.unwrap().unwrap();
    assert_eq!(first, PathBuf::from("a.png"));

    cmd_tx.send(ViewerCommand::Previous).await.unwrap();
    let LoadQuilt(prev) = timeout(WAIT, load_rx.recv()).await.unwrap().unwrap();
    assert_eq!(prev, PathBuf::from("b.png"));

    cmd_tx.send(ViewerCommand::Next).await.unwrap();
    let LoadQuilt(next) = timeout(WAIT, load_rx.recv()).await.unwrap().unwrap();
    assert_eq!(next, PathBuf::from("a.png"));

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn loader_detects_downsizes_and_reports_invalid() {
    let tmp = tempdir().unwrap();
    let good = tmp.path().join("good.png");
    write_quilt(&good, 640, 640, 4, 6);
    let bad = tmp.path().join("bad.png");
    fs::write(&bad, b"definitely not a png").unwrap();

    let (load_tx, load_rx) = mpsc::channel(4);
    let (invalid_tx, mut invalid_rx) = mpsc::channel(4);
    let (loaded_tx, mut loaded_rx) = mpsc::channel(4);
    let cancel = CancellationToken::new();
    let opts = LoaderOptions {
        max_texture_dimension: 320,
        ..LoaderOptions::default()
    };
    let handle = tokio::spawn(loader::run(load_rx, invalid_tx, loaded_tx, cancel.clone(), opts));

    load_tx.send(LoadQuilt(good.clone())).await.unwrap();
    let QuiltLoaded(prepared) = timeout(WAIT, loaded_rx.recv()).await.unwrap().unwrap();
    assert_eq!(prepared.path, good);
    assert_eq!(prepared.tiles, TileGrid::new(4, 6).unwrap());
    assert_eq!((prepared.width, prepared.height), (320, 320));
    assert_eq!(prepared.pixels.len(), 320 * 320 * 4);

    load_tx.send(LoadQuilt(bad.clone())).await.unwrap();
    let InvalidQuilt(path) = timeout(WAIT, invalid_rx.recv()).await.unwrap().unwrap();
    assert_eq!(path, bad);

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tiles_override_wins_over_detection() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("q.png");
    write_quilt(&path, 400, 400, 4, 8);

    let (load_tx, load_rx) = mpsc::channel(4);
    let (invalid_tx, _invalid_rx) = mpsc::channel(4);
    let (loaded_tx, mut loaded_rx) = mpsc::channel(4);
    let cancel = CancellationToken::new();
    let opts = LoaderOptions {
        tiles_override: Some(TileGrid::new(5, 9).unwrap()),
        ..LoaderOptions::default()
    };
    let handle = tokio::spawn(loader::run(load_rx, invalid_tx, loaded_tx, cancel.clone(), opts));

    load_tx.send(LoadQuilt(path)).await.unwrap();
    let QuiltLoaded(prepared) = timeout(WAIT, loaded_rx.recv()).await.unwrap().unwrap();
    assert_eq!(prepared.tiles, TileGrid::new(5, 9).unwrap());

    drop(load_tx);
    cancel.cancel();
    handle.await.unwrap().unwrap();
}
