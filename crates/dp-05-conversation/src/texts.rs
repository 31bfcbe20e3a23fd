//! User-facing Hebrew texts. All end-user output is localized; dynamic
//! values are escaped by the caller before interpolation.

// --- Global keywords ---
pub const KEYWORD_MENU: &[&str] = &["menu", "תפריט", "start"];
pub const KEYWORD_BACK: &[&str] = &["back", "חזרה", "חזור"];
/// Marketing-style entry words that also open the role menu when typed
/// outside a flow.
pub const KEYWORD_MARKETING: &[&str] = &["משלוח"];
/// Words that enroll a sender into courier onboarding when typed outside a
/// flow.
pub const KEYWORD_JOIN: &[&str] = &["שליח", "הצטרפות"];

pub const BTN_CONFIRM: &str = "אישור";
pub const BTN_CANCEL: &str = "ביטול";
pub const BTN_SKIP: &str = "דלג";

// --- Sender ---
pub const ASK_NAME: &str = "ברוכים הבאים! איך קוראים לך?";
pub const SENDER_WELCOME: &str = "נעים להכיר, {name}! מה תרצו לעשות?";
pub const ASK_PICKUP_CITY: &str = "עיר איסוף?";
pub const ASK_PICKUP_STREET: &str = "רחוב איסוף?";
pub const ASK_PICKUP_NUMBER: &str = "מספר בית לאיסוף?";
pub const ASK_PICKUP_APARTMENT: &str = "דירה/קומה לאיסוף? (או \"דלג\")";
pub const ASK_DROPOFF_CITY: &str = "עיר יעד?";
pub const ASK_DROPOFF_STREET: &str = "רחוב יעד?";
pub const ASK_DROPOFF_NUMBER: &str = "מספר בית ביעד?";
pub const ASK_DROPOFF_APARTMENT: &str = "דירה/קומה ביעד? (או \"דלג\")";
pub const ASK_URGENCY: &str = "מתי לאסוף?";
pub const ASK_TIME: &str = "לאיזו שעה?";
pub const ASK_PRICE: &str = "מה המחיר המוצע? (או \"דלג\")";
pub const ASK_DESCRIPTION: &str = "מה שולחים?";
pub const CONFIRM_SHIPMENT: &str = "<b>סיכום המשלוח</b>\n{summary}\nלאשר?";
pub const SHIPMENT_CREATED: &str = "המשלוח נוצר ונשלח לשליחים!";
pub const SHIPMENT_CANCELLED_DRAFT: &str = "הטיוטה בוטלה.";

pub const URGENCY_IMMEDIATE: &str = "מיידי";
pub const URGENCY_SCHEDULED: &str = "לתיאום";

// --- Courier ---
pub const COURIER_ASK_FULL_NAME: &str = "הצטרפות כשליח — מה שמך המלא?";
pub const COURIER_ASK_ID_DOC: &str = "צלמו ושלחו תעודת זהות.";
pub const COURIER_ASK_SELFIE: &str = "שלחו תמונת סלפי ברורה.";
pub const COURIER_ASK_VEHICLE_CATEGORY: &str = "איזה רכב? (אופנוע / רכב / אופניים)";
pub const COURIER_ASK_VEHICLE_PHOTO: &str = "שלחו תמונה של הרכב.";
pub const COURIER_ASK_TERMS: &str = "קראו את התנאים ואשרו כדי להמשיך.";
pub const COURIER_PENDING: &str = "הבקשה התקבלה! נעדכן ברגע שתאושרו.";
pub const COURIER_ASK_AREA: &str = "מה אזור השירות החדש?";
pub const COURIER_AREA_SAVED: &str = "אזור השירות עודכן.";
pub const COURIER_ASK_DEPOSIT_AMOUNT: &str = "מה סכום ההפקדה?";
pub const COURIER_ASK_DEPOSIT_UPLOAD: &str = "שלחו צילום אסמכתא.";
pub const COURIER_DEPOSIT_SENT: &str = "ההפקדה נשלחה לאישור.";
pub const MEDIA_REQUIRED: &str = "נדרשת תמונה כדי להמשיך.";

// --- Dispatcher ---
pub const DISPATCHER_ASK_PICKUP: &str = "כתובת איסוף למשלוח החדש?";
pub const DISPATCHER_ASK_DROPOFF: &str = "כתובת יעד?";
pub const DISPATCHER_ASK_FEE: &str = "מה המחיר לשליח?";
pub const DISPATCHER_SHIPMENT_CREATED: &str = "המשלוח נוסף לתחנה.";
pub const DISPATCHER_ASK_CHARGE_PHONE: &str = "מה מספר הטלפון של השליח לחיוב?";
pub const DISPATCHER_ASK_CHARGE_AMOUNT: &str = "מה סכום החיוב?";
pub const DISPATCHER_ASK_CHARGE_REASON: &str = "מה סיבת החיוב?";
pub const DISPATCHER_CHARGE_DONE: &str = "החיוב בוצע. יתרה חדשה: {balance} ₪";
pub const COURIER_NOT_FOUND_BY_PHONE: &str = "לא נמצא שליח עם המספר הזה.";

// --- Station owner ---
pub const STATION_ASK_ADD_DISPATCHER_PHONE: &str = "מה הטלפון של הסדרן החדש?";
pub const STATION_ASK_REMOVE_DISPATCHER_PHONE: &str = "מה הטלפון של הסדרן להסרה?";
pub const STATION_ASK_ADD_OWNER_PHONE: &str = "מה הטלפון של הבעלים החדש?";
pub const STATION_ASK_REMOVE_OWNER_PHONE: &str = "מה הטלפון של הבעלים להסרה?";
pub const STATION_CONFIRM_REMOVE: &str = "להסיר את {name}? פעולה זו מיידית.";
pub const STATION_MEMBER_ADDED: &str = "נוסף בהצלחה.";
pub const STATION_MEMBER_REMOVED: &str = "הוסר בהצלחה.";
pub const STATION_ASK_COMMISSION: &str = "מה אחוז העמלה החדש? (בין 0.06 ל-0.12)";
pub const STATION_COMMISSION_SAVED: &str = "אחוז העמלה עודכן.";
pub const STATION_ASK_BLACKLIST_PHONE: &str = "מה הטלפון של השליח לחסימה?";
pub const STATION_ASK_UNBLACKLIST_PHONE: &str = "מה הטלפון של השליח לשחרור?";
pub const STATION_BLACKLIST_ADDED: &str = "השליח נחסם בתחנה.";
pub const STATION_BLACKLIST_REMOVED: &str = "השליח שוחרר.";
pub const STATION_ASK_GROUP: &str = "שלחו את מזהה קבוצת התחנה.";
pub const STATION_GROUP_SAVED: &str = "קבוצת התחנה עודכנה.";
pub const STATION_LOOKUP_FAILED: &str =
    "לא נמצאה תחנה פעילה עבור המשתמש שלך. פנו לתמיכה.";

// --- Shared ---
pub const UNKNOWN_INPUT: &str = "לא הבנתי. בחרו מהתפריט.";
pub const ACTION_DONE: &str = "בוצע!";
pub const ADMIN_MENU_TEXT: &str = "תפריט ניהול: השתמשו בפאנל הניהול לפעולות מערכת.";

/// Simple `{placeholder}` substitution for the few templated texts above.
pub fn fill(template: &str, key: &str, value: &str) -> String {
    template.replace(&format!("{{{key}}}"), value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill() {
        assert_eq!(fill("שלום {name}!", "name", "יוסי"), "שלום יוסי!");
        assert_eq!(fill("ללא תבנית", "name", "x"), "ללא תבנית");
    }
}
