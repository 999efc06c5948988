//! Beobachter fuer Session-Ereignisse
//!
//! Beobachter werden nach dem Freigeben aller Session-Sperren
//! aufgerufen und duerfen deshalb wieder auf den `SessionHandle` zugreifen.
//! Alle Methoden haben leere Standard-Implementierungen.

use std::time::Duration;

use hoerrohr_protocol::AudioFrame;

pub trait SessionBeobachter: Send + Sync + 'static {
    /// Audio-Frame im Zustand ACTIVE empfangen
    fn audio(&self, _frame: &AudioFrame<'_>) {}

    /// Client hat `paused` bestaetigt
    fn pausiert(&self) {}

    /// Client hat `resumed` bestaetigt
    fn fortgesetzt(&self) {}

    /// Client meldet verworfenes Audio
    fn verworfen(&self, _start: Duration, _dauer: Duration) {}

    /// Round-Trip-Zeit aus einem `ping`
    fn statistik(&self, _rtt: Duration) {}

    /// Text-Frame an den Client uebergeben
    fn nachricht_gesendet(&self, _text: &str) {}

    /// Text-Frame vom Client empfangen (vor der Pruefung)
    fn nachricht_empfangen(&self, _text: &str) {}
}
