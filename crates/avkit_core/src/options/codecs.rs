//! Static catalogue of the codecs shipped with the engine builds we target.

use super::errors::{OptionError, OptionsResult};
use super::state::ParseState;
use crate::models::MediaType;

/// One encoder and/or decoder implementation.
#[derive(Debug, Clone, Copy)]
pub struct CodecEntry {
    /// Implementation name (`libx264`, `aac`).
    pub name: &'static str,
    /// Codec descriptor name (`h264`, `aac`).
    pub id: &'static str,
    pub media_type: MediaType,
    pub encoder: bool,
    pub decoder: bool,
}

const fn codec(
    name: &'static str,
    id: &'static str,
    media_type: MediaType,
    encoder: bool,
    decoder: bool,
) -> CodecEntry {
    CodecEntry {
        name,
        id,
        media_type,
        encoder,
        decoder,
    }
}

use MediaType::{Audio, Data, Subtitle, Video};

/// Known codecs. Entries sharing an id are listed in preference order.
pub static CODECS: &[CodecEntry] = &[
    // video
    codec("h264", "h264", Video, false, true),
    codec("libx264", "h264", Video, true, false),
    codec("libx264rgb", "h264", Video, true, false),
    codec("libopenh264", "h264", Video, true, true),
    codec("h264_videotoolbox", "h264", Video, true, false),
    codec("h264_mediacodec", "h264", Video, true, true),
    codec("h264_nvenc", "h264", Video, true, false),
    codec("h264_qsv", "h264", Video, true, true),
    codec("h264_vaapi", "h264", Video, true, false),
    codec("hevc", "hevc", Video, false, true),
    codec("libx265", "hevc", Video, true, false),
    codec("libkvazaar", "hevc", Video, true, false),
    codec("hevc_videotoolbox", "hevc", Video, true, false),
    codec("hevc_mediacodec", "hevc", Video, true, true),
    codec("hevc_nvenc", "hevc", Video, true, false),
    codec("hevc_qsv", "hevc", Video, true, true),
    codec("hevc_vaapi", "hevc", Video, true, false),
    codec("mpeg1video", "mpeg1video", Video, true, true),
    codec("mpeg2video", "mpeg2video", Video, true, true),
    codec("mpeg4", "mpeg4", Video, true, true),
    codec("libxvid", "mpeg4", Video, true, false),
    codec("h263", "h263", Video, true, true),
    codec("h263p", "h263p", Video, true, true),
    codec("libvpx", "vp8", Video, true, true),
    codec("vp8", "vp8", Video, false, true),
    codec("vp9", "vp9", Video, false, true),
    codec("libvpx-vp9", "vp9", Video, true, true),
    codec("av1", "av1", Video, false, true),
    codec("libdav1d", "av1", Video, false, true),
    codec("libaom-av1", "av1", Video, true, true),
    codec("libsvtav1", "av1", Video, true, false),
    codec("librav1e", "av1", Video, true, false),
    codec("libtheora", "theora", Video, true, false),
    codec("theora", "theora", Video, false, true),
    codec("mjpeg", "mjpeg", Video, true, true),
    codec("png", "png", Video, true, true),
    codec("apng", "apng", Video, true, true),
    codec("bmp", "bmp", Video, true, true),
    codec("gif", "gif", Video, true, true),
    codec("libwebp", "webp", Video, true, false),
    codec("webp", "webp", Video, false, true),
    codec("tiff", "tiff", Video, true, true),
    codec("prores", "prores", Video, true, true),
    codec("prores_ks", "prores", Video, true, false),
    codec("prores_aw", "prores", Video, true, false),
    codec("dnxhd", "dnxhd", Video, true, true),
    codec("dvvideo", "dvvideo", Video, true, true),
    codec("ffv1", "ffv1", Video, true, true),
    codec("huffyuv", "huffyuv", Video, true, true),
    codec("rawvideo", "rawvideo", Video, true, true),
    codec("wmv2", "wmv2", Video, true, true),
    codec("flv", "flv1", Video, true, true),
    // audio
    codec("aac", "aac", Audio, true, true),
    codec("libfdk_aac", "aac", Audio, true, true),
    codec("aac_at", "aac", Audio, true, true),
    codec("mp3", "mp3", Audio, false, true),
    codec("libmp3lame", "mp3", Audio, true, false),
    codec("libshine", "mp3", Audio, true, false),
    codec("mp2", "mp2", Audio, true, true),
    codec("ac3", "ac3", Audio, true, true),
    codec("eac3", "eac3", Audio, true, true),
    codec("dca", "dts", Audio, true, true),
    codec("truehd", "truehd", Audio, true, true),
    codec("opus", "opus", Audio, true, true),
    codec("libopus", "opus", Audio, true, true),
    codec("vorbis", "vorbis", Audio, true, true),
    codec("libvorbis", "vorbis", Audio, true, true),
    codec("flac", "flac", Audio, true, true),
    codec("alac", "alac", Audio, true, true),
    codec("wmav2", "wmav2", Audio, true, true),
    codec("libopencore_amrnb", "amr_nb", Audio, true, true),
    codec("libopencore_amrwb", "amr_wb", Audio, false, true),
    codec("libvo_amrwbenc", "amr_wb", Audio, true, false),
    codec("libtwolame", "mp2", Audio, true, false),
    codec("libspeex", "speex", Audio, true, true),
    codec("libilbc", "ilbc", Audio, true, true),
    codec("pcm_s16le", "pcm_s16le", Audio, true, true),
    codec("pcm_s16be", "pcm_s16be", Audio, true, true),
    codec("pcm_s24le", "pcm_s24le", Audio, true, true),
    codec("pcm_s32le", "pcm_s32le", Audio, true, true),
    codec("pcm_f32le", "pcm_f32le", Audio, true, true),
    codec("pcm_f64le", "pcm_f64le", Audio, true, true),
    codec("pcm_u8", "pcm_u8", Audio, true, true),
    codec("pcm_alaw", "pcm_alaw", Audio, true, true),
    codec("pcm_mulaw", "pcm_mulaw", Audio, true, true),
    // subtitles
    codec("subrip", "subrip", Subtitle, true, true),
    codec("srt", "subrip", Subtitle, true, true),
    codec("ass", "ass", Subtitle, true, true),
    codec("ssa", "ass", Subtitle, true, true),
    codec("webvtt", "webvtt", Subtitle, true, true),
    codec("mov_text", "mov_text", Subtitle, true, true),
    codec("text", "text", Subtitle, true, true),
    codec("dvdsub", "dvd_subtitle", Subtitle, true, true),
    codec("dvbsub", "dvb_subtitle", Subtitle, true, true),
    codec("pgssub", "hdmv_pgs_subtitle", Subtitle, false, true),
    codec("cc_dec", "eia_608", Subtitle, false, true),
    // data
    codec("bintext", "bintext", Data, false, true),
    codec("bin_data", "bin_data", Data, false, false),
];

/// Implementation names, optionally restricted to encoders or decoders.
pub fn codec_names(encoders: Option<bool>) -> impl Iterator<Item = &'static CodecEntry> {
    CODECS.iter().filter(move |c| match encoders {
        Some(true) => c.encoder,
        Some(false) => c.decoder,
        None => true,
    })
}

fn lookup(name: &str, encoder: bool) -> Option<&'static CodecEntry> {
    let usable = |c: &&CodecEntry| if encoder { c.encoder } else { c.decoder };
    CODECS
        .iter()
        .filter(usable)
        .find(|c| c.name == name)
        .or_else(|| CODECS.iter().filter(usable).find(|c| c.id == name))
}

/// Resolve a codec name for `media_type`.
///
/// Implementation names are tried first, then descriptor names (`h264`
/// selects the preferred `h264` encoder). Returns the implementation name.
pub fn find_codec(
    state: &ParseState<'_>,
    name: &str,
    media_type: MediaType,
    encoder: bool,
) -> OptionsResult<String> {
    if !state.env.validate_codecs {
        return Ok(name.to_string());
    }

    let kind = if encoder { "encoder" } else { "decoder" };
    let entry = match lookup(name, encoder) {
        Some(entry) => entry,
        None => {
            state.log(
                crate::logging::LogLevel::Fatal,
                format!("Unknown {} '{}'", kind, name),
            );
            return Err(if encoder {
                OptionError::EncoderNotFound(name.to_string())
            } else {
                OptionError::DecoderNotFound(name.to_string())
            });
        }
    };

    if entry.name != name {
        state.verbose(format!(
            "Matched {} '{}' for codec '{}'.",
            kind, entry.name, entry.id
        ));
    }

    if entry.media_type != media_type && !state.globals.recast_media {
        return Err(OptionError::invalid(format!(
            "Invalid {} type '{}'",
            kind, name
        )));
    }

    Ok(entry.name.to_string())
}

/// Media type of a codec implementation or descriptor name.
pub fn codec_media_type(name: &str) -> Option<MediaType> {
    CODECS
        .iter()
        .find(|c| c.name == name || c.id == name)
        .map(|c| c.media_type)
}
