//! Button labels, keyboards and fixed replies.

use crate::telegram::types::ReplyMarkup;

pub const BUTTON_CHECK_PAYMENT: &str = "Проверить оплату";
pub const BUTTON_SUPPORT: &str = "Поддержка";
pub const BUTTON_CANCEL: &str = "Отмена";
pub const BUTTON_SUPPORT_REPLY: &str = "Ответить";
pub const BUTTON_JOIN_GROUP: &str = "Вступить в группу 🔐";

pub const ADMIN_MENU: &str = "Админ-меню";
pub const ADMIN_SET_GROUP: &str = "Установить группу";
pub const ADMIN_EXPORT_LOGS: &str = "Выгрузить логи";
pub const ADMIN_FIND_PAYMENT: &str = "Найти оплату";
pub const ADMIN_REBIND_PAYMENT: &str = "Перепривязать оплату";
pub const ADMIN_REMOVE_USER: &str = "Удалить участника";
pub const ADMIN_UNBAN_USER: &str = "Разбанить участника";

/// Texts the admin router owns; the payment check never sees them.
pub const ADMIN_MENU_BUTTONS: &[&str] = &[
    ADMIN_MENU,
    ADMIN_SET_GROUP,
    ADMIN_EXPORT_LOGS,
    ADMIN_FIND_PAYMENT,
    ADMIN_REBIND_PAYMENT,
    ADMIN_REMOVE_USER,
    ADMIN_UNBAN_USER,
    BUTTON_CANCEL,
];

pub const SUPPORT_REPLY_PREFIX: &str = "support_reply:";

pub const START: &str = "Привет! Я бот марафона.\n\n\
    Я буду выдавать доступ в закрытую группу после оплаты.\n\
    Нажми кнопку ниже и отправь свой email или телефон для проверки оплаты.";
pub const PROMPT_PAYMENT_CHECK: &str = "Введите email или телефон, который вы указали при оплате.";
pub const SUPPORT_INTRO: &str = "Опишите проблему одним сообщением — я передам администратору.";
pub const SUPPORT_CHECK_HINT: &str = "Если хотите проверить оплату, нажмите «Проверить оплату».";
pub const ASK_TEXT: &str = "Пожалуйста, напишите сообщение текстом.";
pub const CANCELLED: &str = "Ок, отменено.";
pub const SUPPORT_SENT: &str = "Спасибо! Сообщение отправлено администратору.";
pub const BAD_CALLBACK: &str = "Некорректный запрос";
pub const PROMPT_ADMIN_REPLY: &str = "Введите ответ для пользователя.";
pub const ASK_REPLY_TEXT: &str = "Пожалуйста, напишите ответ текстом.";
pub const REPLY_SENT: &str = "Ответ отправлен пользователю.";
pub const REPLY_FAILED: &str = "Не удалось отправить ответ пользователю.";

pub const ASK_CONTACT: &str = "Отправь, пожалуйста, email, телефон или номер заказа.";
pub const PAYMENT_ALREADY_USED: &str = "Эта оплата уже использована для доступа.\n\
    Если вы оплатили новый поток, пожалуйста, укажите \
    новый email/телефон или напишите в поддержку.";
pub const PAYMENT_NOT_FOUND: &str = "Я не нашёл оплаченный заказ по этим данным.\n\
    Проверь, пожалуйста, правильно ли ты ввёл адрес, \
    или напиши в поддержку.";
pub const PAYMENT_OTHER_ACCOUNT: &str = "Эта оплата уже использована с другим Telegram-аккаунтом.\n\
    Если это ошибка, напиши, пожалуйста, в поддержку.";
pub const PAYMENT_NO_GROUP: &str = "Оплата подтверждена, но пока не настроена группа для выдачи доступа.\n\
    Свяжись с администратором марафона.";

pub const ADMIN_MENU_TITLE: &str = "Админ-меню:";
pub const ADMIN_HELP: &str = "Доступные команды администратора:\n\
    /admin — открыть меню кнопок\n\
    /find_payment <email, телефон или order_id> — найти оплату и связки\n\
    /export_logs <YYYY-MM-DD> <YYYY-MM-DD> [название группы] — CSV выгрузка\n\
    /rebind_payment <email|телефон|order_id> <telegram_id> — перепривязать оплату\n\
    В меню есть кнопка «Удалить участника»";
pub const USAGE_ADD_TEST_PAYMENT: &str = "Формат: /add_test_payment <order_id> <email> [телефон]";
pub const USAGE_SET_GROUP: &str = "Формат: /set_group <invite_link> <название группы одной строкой>";
pub const USAGE_FIND_PAYMENT: &str = "Формат: /find_payment <email, телефон или order_id>";
pub const USAGE_EXPORT_LOGS: &str = "Формат: /export_logs <YYYY-MM-DD> <YYYY-MM-DD> [название группы]";
pub const USAGE_REBIND_PAYMENT: &str = "Формат: /rebind_payment <email|телефон|order_id> <telegram_id>";
pub const DUPLICATE_ORDER: &str = "Оплата с таким order_id уже есть.";
pub const PROMPT_INVITE_LINK: &str = "Пришли invite-link для группы (t.me/...).";
pub const PROMPT_GROUP_NAME: &str = "Теперь пришли название группы.";
pub const PROMPT_EXPORT_START: &str = "Дата начала в формате YYYY-MM-DD.";
pub const PROMPT_EXPORT_END: &str = "Дата окончания в формате YYYY-MM-DD.";
pub const PROMPT_EXPORT_GROUP: &str = "Название группы (или '-' если все).";
pub const BAD_START_DATE: &str = "Неверный формат даты. Пример: 2025-01-15";
pub const BAD_END_DATE: &str = "Неверный формат даты. Пример: 2025-01-31";
pub const BAD_DATE: &str = "Дата должна быть в формате YYYY-MM-DD.";
pub const NO_LOG_RECORDS: &str = "Записей за этот период нет.";
pub const PROMPT_FIND_PAYMENT: &str = "Введи email, телефон или order_id.";
pub const PROMPT_REBIND_KEY: &str = "Введи email, телефон или order_id для перепривязки.";
pub const PROMPT_REBIND_TELEGRAM: &str = "Введи Telegram ID пользователя.";
pub const TELEGRAM_ID_NOT_NUMBER: &str = "Telegram ID должен быть числом.";
pub const PROMPT_REMOVE_USER: &str = "Введи email, телефон или order_id участника для удаления из группы.";
pub const PROMPT_UNBAN_USER: &str = "Введи email, телефон или order_id участника для разбана.";
pub const ADMIN_PAYMENT_NOT_FOUND: &str = "Оплата не найдена.";
pub const PAYMENT_NOT_BOUND: &str = "Пользователь не привязан к этой оплате.";
pub const CANNOT_REMOVE_SELF: &str = "Нельзя удалить самого себя.";
pub const GROUP_CHAT_UNKNOWN: &str = "Не вижу chat_id группы. Отправьте тестовую заявку на вступление, \
    чтобы бот сохранил chat_id.";
pub const REMOVE_FAILED: &str = "Не удалось удалить пользователя. Проверь права бота.";
pub const UNBAN_FAILED: &str = "Не удалось разбанить пользователя. Проверь права бота.";
pub const USER_REMOVED: &str = "Пользователь удалён из группы и заблокирован.";
pub const USER_UNBANNED: &str = "Пользователь разбанен. Теперь он может снова подать заявку на вступление в группу.";

pub fn support_contact_line(contact: &str) -> String {
    format!("Можно написать напрямую: {contact}")
}

pub fn support_request(user_label: &str, text: &str) -> String {
    format!("Новый запрос в поддержку:\n{user_label}\nСообщение: {text}")
}

pub fn support_answer(text: &str) -> String {
    format!("Ответ поддержки:\n{text}")
}

pub fn payment_found(group_name: &str) -> String {
    format!(
        "Оплата найдена ✅\n\nГруппа: {group_name}\n\
         Нажми кнопку ниже и отправь заявку на вступление 👇"
    )
}

pub fn test_payment_added(order_id: &str, email: &str) -> String {
    format!("Тестовая оплата добавлена: {order_id} / {email}")
}

pub fn group_set(group_name: &str, invite_link: &str) -> String {
    format!("Текущая группа установлена:\n{group_name}\n{invite_link}")
}

pub fn payment_rebound(order_id: &str, telegram_id: &str) -> String {
    format!("Оплата {order_id} привязана к Telegram ID {telegram_id}.")
}

/// Group filter values meaning "every group".
pub const ALL_GROUPS_MARKERS: &[&str] = &["-", "все", "all"];

pub fn main_keyboard() -> ReplyMarkup {
    ReplyMarkup::column(
        &[BUTTON_CHECK_PAYMENT, BUTTON_SUPPORT],
        "Введите email или телефон для проверки оплаты",
    )
}

pub fn support_keyboard() -> ReplyMarkup {
    ReplyMarkup::column(&[BUTTON_CANCEL, BUTTON_CHECK_PAYMENT], "Опишите проблему")
}

pub fn admin_reply_keyboard() -> ReplyMarkup {
    ReplyMarkup::column(&[BUTTON_CANCEL, ADMIN_MENU], "Введите ответ пользователю")
}

pub fn admin_menu_keyboard() -> ReplyMarkup {
    ReplyMarkup::column(
        &[
            ADMIN_SET_GROUP,
            ADMIN_FIND_PAYMENT,
            ADMIN_EXPORT_LOGS,
            ADMIN_REBIND_PAYMENT,
            ADMIN_REMOVE_USER,
            ADMIN_UNBAN_USER,
        ],
        "Выберите действие",
    )
}

pub fn cancel_keyboard() -> ReplyMarkup {
    ReplyMarkup::column(&[BUTTON_CANCEL], "Можно отменить")
}

pub fn is_admin_menu_button(text: &str) -> bool {
    ADMIN_MENU_BUTTONS.contains(&text)
}

/// `None` when the marker asks for every group.
pub fn group_filter(raw: &str) -> Option<&str> {
    let raw = raw.trim();
    if raw.is_empty() || ALL_GROUPS_MARKERS.contains(&raw.to_lowercase().as_str()) {
        None
    } else {
        Some(raw)
    }
}
