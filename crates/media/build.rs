use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    // Nothing to do unless we're linking against FFmpeg.
    if env::var_os("CARGO_FEATURE_FFMPEG").is_none() {
        return;
    }

    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap();
    match target_os.as_str() {
        "windows" => windows(),
        // The system's shared libraries are found by the dynamic linker.
        "macos" | "linux" => {}
        _ => panic!("Unsupported target OS `{target_os}` for the `ffmpeg` feature."),
    }
}

fn windows() {
    // The FFmpeg DLLs have to be next to the executable so it can link to
    // them at runtime.

    println!("cargo:rerun-if-env-changed=FFMPEG_DIR");

    let ffmpeg_dir = env::var("FFMPEG_DIR")
        .expect("`FFMPEG_DIR` must point at an FFmpeg build to use the `ffmpeg` feature.");

    let ffmpeg_bin_dir = Path::new(&ffmpeg_dir).join("bin");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let target_dir = out_dir.ancestors().nth(3).unwrap();

    for entry in fs::read_dir(&ffmpeg_bin_dir).unwrap() {
        let entry_path = entry.unwrap().path();

        if entry_path.extension().and_then(|s| s.to_str()) == Some("dll") {
            let dll_file_name = entry_path.file_name().unwrap();

            fs::copy(&entry_path, target_dir.join(dll_file_name)).unwrap();
            fs::copy(&entry_path, target_dir.join("deps").join(dll_file_name)).unwrap();
        }
    }
}
