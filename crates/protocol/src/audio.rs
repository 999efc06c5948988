//! Audio-Frames – Typisierte Sicht auf binaere AudioHook-Frames
//!
//! Binaere Frames tragen das ausgehandelte Format ohne Umschlag, die Samples
//! aller Kanaele liegen interleaved hintereinander. `AudioFrame` prueft nur
//! die Frame-Groesse; Formatkonvertierung und Kanal-Extraktion passieren erst
//! beim Zugriff.
//!
//! ```text
//! PCMU, 2 Kanaele:  | ext0 | int0 | ext1 | int1 | ...     (1 Byte/Sample)
//! L16,  2 Kanaele:  | ext0 ext0 | int0 int0 | ...         (2 Bytes LE/Sample)
//! ```

use std::borrow::Cow;
use std::time::Duration;

use crate::error::AudioFehler;
use crate::media::{KanalRolle, MediaFormat, MediaParameter};

// ---------------------------------------------------------------------------
// AudioFrame
// ---------------------------------------------------------------------------

/// Ein empfangener Audio-Frame im ausgehandelten Format
#[derive(Debug, Clone, Copy)]
pub struct AudioFrame<'a> {
    media: &'a MediaParameter,
    daten: &'a [u8],
}

impl<'a> AudioFrame<'a> {
    /// Interpretiert `daten` gemaess `media`
    ///
    /// # Fehler
    /// - `KeineKanaele` wenn die Media-Parameter keine Kanaele haben
    /// - `UngueltigeFrameGroesse` wenn die Laenge kein ganzzahliges
    ///   Vielfaches der Sample-Frame-Groesse ist
    pub fn neu(media: &'a MediaParameter, daten: &'a [u8]) -> Result<Self, AudioFehler> {
        let frame_groesse = media.frame_groesse();
        if frame_groesse == 0 {
            return Err(AudioFehler::KeineKanaele);
        }
        if daten.len() % frame_groesse != 0 {
            return Err(AudioFehler::UngueltigeFrameGroesse {
                laenge: daten.len(),
                frame_groesse,
            });
        }
        Ok(Self { media, daten })
    }

    pub fn media(&self) -> &'a MediaParameter {
        self.media
    }

    pub fn format(&self) -> MediaFormat {
        self.media.format
    }

    pub fn kanal_anzahl(&self) -> usize {
        self.media.channels.len()
    }

    /// Anzahl Samples pro Kanal
    pub fn sample_anzahl(&self) -> usize {
        self.daten.len() / self.media.frame_groesse()
    }

    /// Abspieldauer des Frames
    pub fn dauer(&self) -> Duration {
        if self.media.rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.sample_anzahl() as u64 * 1_000_000_000 / self.media.rate as u64)
    }

    /// Unveraenderte Nutzdaten
    pub fn rohdaten(&self) -> &'a [u8] {
        self.daten
    }

    /// Interleaved-Puffer im gewuenschten Format
    ///
    /// Ist `ziel` das native Format, wird der Puffer ohne Kopie geliefert.
    pub fn daten_als(&self, ziel: MediaFormat) -> Cow<'a, [u8]> {
        if ziel == self.format() {
            return Cow::Borrowed(self.daten);
        }
        Cow::Owned(konvertieren(self.format(), ziel, self.daten, 0, 1))
    }

    /// Alle Samples interleaved als 16-Bit-PCM
    pub fn samples(&self) -> impl Iterator<Item = i16> + 'a {
        sample_iter(self.format(), self.daten, 0, 1)
    }

    /// Sicht auf einen einzelnen Kanal
    pub fn kanal(&self, rolle: KanalRolle) -> Option<KanalAnsicht<'a>> {
        let index = self.media.kanal_index(rolle)?;
        Some(KanalAnsicht {
            rolle,
            index,
            kanal_anzahl: self.kanal_anzahl(),
            format: self.format(),
            daten: self.daten,
        })
    }

    /// Sichten auf alle Kanaele in Interleaving-Reihenfolge
    pub fn kanaele(&self) -> impl Iterator<Item = KanalAnsicht<'a>> + '_ {
        self.media
            .channels
            .iter()
            .filter_map(move |rolle| self.kanal(*rolle))
    }
}

// ---------------------------------------------------------------------------
// KanalAnsicht
// ---------------------------------------------------------------------------

/// Sicht auf die Samples eines Kanals innerhalb eines Frames
#[derive(Debug, Clone, Copy)]
pub struct KanalAnsicht<'a> {
    rolle: KanalRolle,
    index: usize,
    kanal_anzahl: usize,
    format: MediaFormat,
    daten: &'a [u8],
}

impl<'a> KanalAnsicht<'a> {
    pub fn rolle(&self) -> KanalRolle {
        self.rolle
    }

    pub fn sample_anzahl(&self) -> usize {
        self.daten.len() / (self.kanal_anzahl * self.format.bytes_pro_sample())
    }

    /// Samples dieses Kanals als 16-Bit-PCM (Dekodierung beim Iterieren)
    pub fn samples(&self) -> impl Iterator<Item = i16> + 'a {
        sample_iter(self.format, self.daten, self.index, self.kanal_anzahl)
    }

    /// De-interleavte Kanal-Daten im gewuenschten Format
    pub fn daten_als(&self, ziel: MediaFormat) -> Vec<u8> {
        konvertieren(self.format, ziel, self.daten, self.index, self.kanal_anzahl)
    }
}

// ---------------------------------------------------------------------------
// Konvertierung
// ---------------------------------------------------------------------------

fn sample_iter(
    format: MediaFormat,
    daten: &[u8],
    index: usize,
    schritt: usize,
) -> impl Iterator<Item = i16> + '_ {
    let bps = format.bytes_pro_sample();
    daten
        .chunks_exact(bps)
        .skip(index)
        .step_by(schritt)
        .map(move |sample| match format {
            MediaFormat::Pcmu => ulaw_zu_linear(sample[0]),
            MediaFormat::L16 => i16::from_le_bytes([sample[0], sample[1]]),
        })
}

fn konvertieren(
    von: MediaFormat,
    nach: MediaFormat,
    daten: &[u8],
    index: usize,
    schritt: usize,
) -> Vec<u8> {
    let bps = von.bytes_pro_sample();
    if von == nach {
        return daten
            .chunks_exact(bps)
            .skip(index)
            .step_by(schritt)
            .flatten()
            .copied()
            .collect();
    }
    let samples = sample_iter(von, daten, index, schritt);
    match nach {
        MediaFormat::Pcmu => samples.map(linear_zu_ulaw).collect(),
        MediaFormat::L16 => samples.flat_map(i16::to_le_bytes).collect(),
    }
}

const ULAW_BIAS: i32 = 0x84;
const ULAW_CLIP: i32 = 32_635;

/// G.711 μ-law -> 16-Bit linear
pub fn ulaw_zu_linear(ulaw: u8) -> i16 {
    let u = !ulaw;
    let exponent = (u >> 4) & 0x07;
    let mantisse = (u & 0x0F) as i32;
    let betrag = (((mantisse << 3) + ULAW_BIAS) << exponent) - ULAW_BIAS;
    if u & 0x80 != 0 {
        -betrag as i16
    } else {
        betrag as i16
    }
}

/// 16-Bit linear -> G.711 μ-law
pub fn linear_zu_ulaw(sample: i16) -> u8 {
    let mut wert = sample as i32;
    let vorzeichen = if wert < 0 {
        wert = -wert;
        0x80
    } else {
        0
    };
    wert = wert.min(ULAW_CLIP) + ULAW_BIAS;

    let mut exponent = 7;
    let mut maske = 0x4000;
    while exponent > 0 && wert & maske == 0 {
        exponent -= 1;
        maske >>= 1;
    }
    let mantisse = (wert >> (exponent + 3)) & 0x0F;
    !((vorzeichen | (exponent << 4) | mantisse) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo(format: MediaFormat) -> MediaParameter {
        MediaParameter::audio(format, vec![KanalRolle::External, KanalRolle::Internal], 8000)
    }

    #[test]
    fn ulaw_stille_und_extremwerte() {
        assert_eq!(ulaw_zu_linear(0xFF), 0);
        assert_eq!(ulaw_zu_linear(0x00), -32_124);
        assert_eq!(ulaw_zu_linear(0x80), 32_124);
        assert_eq!(linear_zu_ulaw(0), 0xFF);
        assert_eq!(linear_zu_ulaw(i16::MAX), 0x80);
    }

    #[test]
    fn ulaw_kodierung_ist_umkehrbar() {
        // 0x7F ist die negative Null und kodiert zu 0xFF
        for u in (0u8..=255).filter(|u| *u != 0x7F) {
            assert_eq!(linear_zu_ulaw(ulaw_zu_linear(u)), u, "Byte {u:#04x}");
        }
    }

    #[test]
    fn frame_groesse_muss_passen() {
        let media = stereo(MediaFormat::L16);
        let ergebnis = AudioFrame::neu(&media, &[0u8; 6]);
        assert_eq!(
            ergebnis.unwrap_err(),
            AudioFehler::UngueltigeFrameGroesse {
                laenge: 6,
                frame_groesse: 4
            }
        );
        assert!(AudioFrame::neu(&media, &[0u8; 8]).is_ok());
    }

    #[test]
    fn kanaele_extrahieren_pcmu() {
        let media = stereo(MediaFormat::Pcmu);
        let daten = [0xFF, 0x00, 0xFF, 0x80];
        let frame = AudioFrame::neu(&media, &daten).unwrap();

        assert_eq!(frame.sample_anzahl(), 2);
        let extern_kanal = frame.kanal(KanalRolle::External).unwrap();
        assert_eq!(extern_kanal.samples().collect::<Vec<_>>(), vec![0, 0]);
        let intern_kanal = frame.kanal(KanalRolle::Internal).unwrap();
        assert_eq!(
            intern_kanal.samples().collect::<Vec<_>>(),
            vec![-32_124, 32_124]
        );
        assert_eq!(intern_kanal.daten_als(MediaFormat::Pcmu), vec![0x00, 0x80]);
    }

    #[test]
    fn kanaele_extrahieren_l16() {
        let media = stereo(MediaFormat::L16);
        let mut daten = Vec::new();
        for s in [100i16, -100, 200, -200] {
            daten.extend_from_slice(&s.to_le_bytes());
        }
        let frame = AudioFrame::neu(&media, &daten).unwrap();

        let intern_kanal = frame.kanal(KanalRolle::Internal).unwrap();
        assert_eq!(intern_kanal.samples().collect::<Vec<_>>(), vec![-100, -200]);
        assert_eq!(frame.kanaele().count(), 2);
    }

    #[test]
    fn natives_format_ohne_kopie() {
        let media = stereo(MediaFormat::Pcmu);
        let daten = [0xFF; 16];
        let frame = AudioFrame::neu(&media, &daten).unwrap();
        assert!(matches!(frame.daten_als(MediaFormat::Pcmu), Cow::Borrowed(_)));
        // PCMU -> L16 verdoppelt die Laenge
        assert_eq!(frame.daten_als(MediaFormat::L16).len(), 32);
    }

    #[test]
    fn fehlender_kanal() {
        let media = MediaParameter::audio(MediaFormat::Pcmu, vec![KanalRolle::External], 8000);
        let daten = [0xFF; 4];
        let frame = AudioFrame::neu(&media, &daten).unwrap();
        assert!(frame.kanal(KanalRolle::Internal).is_none());
    }

    #[test]
    fn dauer_aus_abtastrate() {
        let media = MediaParameter::audio(MediaFormat::Pcmu, vec![KanalRolle::External], 8000);
        let daten = vec![0xFF; 160];
        let frame = AudioFrame::neu(&media, &daten).unwrap();
        assert_eq!(frame.dauer(), Duration::from_millis(20));
    }
}
