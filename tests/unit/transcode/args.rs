use super::*;

fn gif() -> GifArgs {
    GifArgs {
        input_fps: 10.0,
        trim: None,
        width: 480,
        fps: 10,
        palette: false,
        output: "out.gif".to_string(),
    }
}

#[test]
fn codec_follows_container_and_codec_hint() {
    assert_eq!(codec_for_mime("video/webm;codecs=vp9").unwrap(), "libvpx-vp9");
    assert_eq!(codec_for_mime("video/webm; codecs=\"VP9,opus\"").unwrap(), "libvpx-vp9");
    assert_eq!(codec_for_mime("video/webm").unwrap(), "libvpx");
    assert_eq!(codec_for_mime("video/mp4").unwrap(), "libx264");
    assert_eq!(codec_for_mime("video/quicktime").unwrap(), "libx264");
    assert!(codec_for_mime("video/x-msvideo").is_err());
}

#[test]
fn crop_args_are_ordered() {
    let crop = CropPixels {
        x: 128,
        y: 96,
        width: 384,
        height: 288,
        filter: "crop=384:288:128:96".to_string(),
    };
    assert_eq!(
        crop_args("in.webm", &crop, "libvpx", "out.webm"),
        ["-i", "in.webm", "-vf", "crop=384:288:128:96", "-an", "-c:v", "libvpx", "out.webm"]
    );
}

#[test]
fn minimal_gif_pipeline() {
    assert_eq!(
        gif().build(),
        [
            "-framerate",
            "10",
            "-i",
            "frame_%05d.png",
            "-vf",
            "scale=480:-1:flags=lanczos",
            "-c:v",
            "gif",
            "-r",
            "10",
            "out.gif"
        ]
    );
}

#[test]
fn filter_order_is_trim_scale_palette() {
    let args = GifArgs {
        trim: Some((0.5, 1.25)),
        palette: true,
        ..gif()
    };
    assert_eq!(
        args.filter_chain(),
        "trim=start=0.500:end=1.250,setpts=PTS-STARTPTS,\
         scale=480:-1:flags=lanczos,split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse"
    );
}

#[test]
fn fractional_input_rate_is_kept() {
    let args = GifArgs {
        input_fps: 12.5,
        ..gif()
    };
    assert_eq!(args.build()[1], "12.500");
    assert_eq!(frame_file_name(7), "frame_00007.png");
}
